//! Canned descriptor sets for gateway tests.
//!
//! The protos these encode live under `proto/` for reference; the encoded
//! bytes are built here instead of with `protoc` so the fixtures carry their
//! `google.api.http` annotations byte-for-byte.

use prost::Message;

use crate::pb;

/// One encodable descriptor file plus the service symbols it defines.
#[derive(Clone, Debug)]
pub struct FixtureFile {
    pub name: String,
    pub symbols: Vec<String>,
    pub encoded: Vec<u8>,
}

impl FixtureFile {
    /// Encodes `file`, deriving the reflection symbols from its services.
    pub fn from_proto(file: &pb::FileDescriptorProto) -> Self {
        let package = file.package.clone().unwrap_or_default();
        let symbols = file
            .service
            .iter()
            .filter_map(|service| service.name.as_ref())
            .map(|name| {
                if package.is_empty() {
                    name.clone()
                } else {
                    format!("{package}.{name}")
                }
            })
            .collect();

        Self {
            name: file.name.clone().unwrap_or_default(),
            symbols,
            encoded: file.encode_to_vec(),
        }
    }
}

/// A reflection server's worth of descriptor files.
#[derive(Clone, Debug, Default)]
pub struct FixtureSet {
    pub files: Vec<FixtureFile>,
    pub services: Vec<String>,
}

impl FixtureSet {
    pub fn new(files: Vec<FixtureFile>) -> Self {
        let services = files.iter().flat_map(|file| file.symbols.clone()).collect();
        Self { files, services }
    }

    pub fn file_by_name(&self, name: &str) -> Option<&FixtureFile> {
        self.files.iter().find(|file| file.name == name)
    }

    pub fn file_containing_symbol(&self, symbol: &str) -> Option<&FixtureFile> {
        self.files
            .iter()
            .find(|file| file.symbols.iter().any(|s| s == symbol))
    }
}

/// The standard library fixture: two services over two files, with
/// `library.proto` importing `types.proto` and the annotation schema.
pub fn library_set() -> FixtureSet {
    FixtureSet::new(vec![
        FixtureFile::from_proto(&library_file("/v1/items/{id}")),
        FixtureFile::from_proto(&types_file()),
    ])
}

/// The same backend after a schema rollout: `GetItem` moved paths.
pub fn library_set_v2() -> FixtureSet {
    FixtureSet::new(vec![
        FixtureFile::from_proto(&library_file("/v1/objects/{id}")),
        FixtureFile::from_proto(&types_file()),
    ])
}

/// A backend whose annotations bind two methods to the same route.
pub fn conflict_set() -> FixtureSet {
    FixtureSet::new(vec![FixtureFile::from_proto(&conflict_file())])
}

fn library_file(get_item_path: &str) -> pb::FileDescriptorProto {
    let library = pb::ServiceDescriptorProto {
        name: Some("LibraryService".to_owned()),
        method: vec![
            method(
                "GetItem",
                ".library.v1.GetItemRequest",
                ".library.v1.Item",
                Some(get(get_item_path)),
            ),
            method(
                "ListItems",
                ".library.v1.ListItemsRequest",
                ".library.v1.ListItemsResponse",
                Some(get("/v1/items")),
            ),
            method(
                "CreateItem",
                ".library.v1.CreateItemRequest",
                ".library.v1.Item",
                Some(post("/v1/items", "item")),
            ),
            // PUT with an additional PATCH binding on the same path.
            method(
                "UpdateItem",
                ".library.v1.UpdateItemRequest",
                ".library.v1.Item",
                Some(pb::HttpRule {
                    put: Some("/v1/items/{id}".to_owned()),
                    body: Some("item".to_owned()),
                    additional_bindings: vec![pb::HttpRule {
                        patch: Some("/v1/items/{id}".to_owned()),
                        body: Some("item".to_owned()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            ),
            method(
                "DeleteItem",
                ".library.v1.DeleteItemRequest",
                ".library.v1.Empty",
                Some(pb::HttpRule {
                    delete: Some("/v1/items/{id}".to_owned()),
                    ..Default::default()
                }),
            ),
            method(
                "ReadBlob",
                ".library.v1.ReadBlobRequest",
                ".library.v1.Blob",
                Some(get("/v1/blobs/{path=**}")),
            ),
            // No HTTP annotation: reachable over gRPC only.
            method("Ping", ".library.v1.Empty", ".library.v1.Empty", None),
        ],
    };

    let admin = pb::ServiceDescriptorProto {
        name: Some("AdminService".to_owned()),
        method: vec![method(
            "PurgeItems",
            ".library.v1.Empty",
            ".library.v1.Empty",
            Some(post("/v1/admin/purge", "*")),
        )],
    };

    pb::FileDescriptorProto {
        name: Some("library/v1/library.proto".to_owned()),
        package: Some("library.v1".to_owned()),
        dependency: vec![
            "library/v1/types.proto".to_owned(),
            "google/api/annotations.proto".to_owned(),
        ],
        message_type: vec![],
        service: vec![library, admin],
        syntax: Some("proto3".to_owned()),
    }
}

fn types_file() -> pb::FileDescriptorProto {
    pb::FileDescriptorProto {
        name: Some("library/v1/types.proto".to_owned()),
        package: Some("library.v1".to_owned()),
        dependency: vec![],
        message_type: vec![
            message("Item", vec![string_field("id", 1), string_field("title", 2)]),
            message("GetItemRequest", vec![string_field("id", 1)]),
            message("ListItemsRequest", vec![string_field("page_token", 1)]),
            message(
                "ListItemsResponse",
                vec![repeated_message_field("items", 1, ".library.v1.Item")],
            ),
            message(
                "CreateItemRequest",
                vec![message_field("item", 1, ".library.v1.Item")],
            ),
            message(
                "UpdateItemRequest",
                vec![
                    string_field("id", 1),
                    message_field("item", 2, ".library.v1.Item"),
                ],
            ),
            message("DeleteItemRequest", vec![string_field("id", 1)]),
            message("ReadBlobRequest", vec![string_field("path", 1)]),
            message(
                "Blob",
                vec![string_field("content_type", 1), bytes_field("data", 2)],
            ),
            message("Empty", vec![]),
        ],
        service: vec![],
        syntax: Some("proto3".to_owned()),
    }
}

fn conflict_file() -> pb::FileDescriptorProto {
    let conflict = pb::ServiceDescriptorProto {
        name: Some("ConflictService".to_owned()),
        method: vec![
            method("GetOk", ".conflict.v1.Msg", ".conflict.v1.Msg", Some(get("/v1/ok"))),
            method("GetDupA", ".conflict.v1.Msg", ".conflict.v1.Msg", Some(get("/v1/dup"))),
            // Same verb, same template, different method: must be rejected.
            method("GetDupB", ".conflict.v1.Msg", ".conflict.v1.Msg", Some(get("/v1/dup"))),
        ],
    };

    pb::FileDescriptorProto {
        name: Some("conflict/v1/conflict.proto".to_owned()),
        package: Some("conflict.v1".to_owned()),
        dependency: vec!["google/api/annotations.proto".to_owned()],
        message_type: vec![message("Msg", vec![])],
        service: vec![conflict],
        syntax: Some("proto3".to_owned()),
    }
}

fn method(
    name: &str,
    input_type: &str,
    output_type: &str,
    http: Option<pb::HttpRule>,
) -> pb::MethodDescriptorProto {
    pb::MethodDescriptorProto {
        name: Some(name.to_owned()),
        input_type: Some(input_type.to_owned()),
        output_type: Some(output_type.to_owned()),
        options: http.map(|http| pb::MethodOptions { http: Some(http) }),
    }
}

fn get(path: &str) -> pb::HttpRule {
    pb::HttpRule {
        get: Some(path.to_owned()),
        ..Default::default()
    }
}

fn post(path: &str, body: &str) -> pb::HttpRule {
    pb::HttpRule {
        post: Some(path.to_owned()),
        body: Some(body.to_owned()),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<pb::FieldDescriptorProto>) -> pb::DescriptorProto {
    pb::DescriptorProto {
        name: Some(name.to_owned()),
        field: fields,
    }
}

fn string_field(name: &str, number: i32) -> pb::FieldDescriptorProto {
    scalar_field(name, number, pb::TYPE_STRING)
}

fn bytes_field(name: &str, number: i32) -> pb::FieldDescriptorProto {
    scalar_field(name, number, pb::TYPE_BYTES)
}

fn scalar_field(name: &str, number: i32, kind: i32) -> pb::FieldDescriptorProto {
    pb::FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(pb::LABEL_OPTIONAL),
        r#type: Some(kind),
        type_name: None,
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> pb::FieldDescriptorProto {
    pb::FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(pb::LABEL_OPTIONAL),
        r#type: Some(pb::TYPE_MESSAGE),
        type_name: Some(type_name.to_owned()),
    }
}

fn repeated_message_field(name: &str, number: i32, type_name: &str) -> pb::FieldDescriptorProto {
    pb::FieldDescriptorProto {
        label: Some(pb::LABEL_REPEATED),
        ..message_field(name, number, type_name)
    }
}
