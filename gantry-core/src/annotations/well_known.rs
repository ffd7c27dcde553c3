//! Seed descriptors for the resolver pool.
//!
//! Backends annotated with `google.api.http` import
//! `google/api/annotations.proto`, and gRPC servers rarely serve the
//! `google.protobuf` files it depends on over reflection. Seeding the pool
//! with these descriptors up front keeps those imports off the wire entirely
//! and guarantees the annotation extension is always resolvable.

use prost_reflect::{DescriptorError, DescriptorPool};
use prost_types::descriptor_proto::ExtensionRange;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto, OneofDescriptorProto};

use super::HTTP_EXTENSION_NUMBER;

/// Builds the descriptor pool every resolver starts from.
pub(crate) fn well_known_pool() -> Result<DescriptorPool, DescriptorError> {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(descriptor_stub_proto())?;
    pool.add_file_descriptor_proto(any_proto())?;
    pool.add_file_descriptor_proto(http_proto())?;
    pool.add_file_descriptor_proto(annotations_proto())?;
    pool.add_file_descriptor_proto(httpbody_proto())?;
    Ok(pool)
}

/// `google/protobuf/descriptor.proto`, reduced to what the annotation
/// extension needs: the extendee message and an extension range covering
/// field 72295728.
fn descriptor_stub_proto() -> FileDescriptorProto {
    let method_options = DescriptorProto {
        name: Some("MethodOptions".to_owned()),
        extension_range: vec![ExtensionRange {
            start: Some(1000),
            end: Some(536_870_912),
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("google/protobuf/descriptor.proto".to_owned()),
        package: Some("google.protobuf".to_owned()),
        message_type: vec![method_options],
        syntax: Some("proto2".to_owned()),
        ..Default::default()
    }
}

fn any_proto() -> FileDescriptorProto {
    let any = DescriptorProto {
        name: Some("Any".to_owned()),
        field: vec![
            string_field("type_url", 1),
            scalar_field("value", 2, Type::Bytes),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("google/protobuf/any.proto".to_owned()),
        package: Some("google.protobuf".to_owned()),
        message_type: vec![any],
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn http_proto() -> FileDescriptorProto {
    let http = DescriptorProto {
        name: Some("Http".to_owned()),
        field: vec![
            repeated(message_field("rules", 1, ".google.api.HttpRule")),
            scalar_field("fully_decode_reserved_expansion", 2, Type::Bool),
        ],
        ..Default::default()
    };

    let http_rule = DescriptorProto {
        name: Some("HttpRule".to_owned()),
        field: vec![
            string_field("selector", 1),
            oneof_member(string_field("get", 2)),
            oneof_member(string_field("put", 3)),
            oneof_member(string_field("post", 4)),
            oneof_member(string_field("delete", 5)),
            oneof_member(string_field("patch", 6)),
            oneof_member(message_field("custom", 8, ".google.api.CustomHttpPattern")),
            string_field("body", 7),
            string_field("response_body", 12),
            repeated(message_field("additional_bindings", 11, ".google.api.HttpRule")),
        ],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("pattern".to_owned()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let custom_http_pattern = DescriptorProto {
        name: Some("CustomHttpPattern".to_owned()),
        field: vec![string_field("kind", 1), string_field("path", 2)],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("google/api/http.proto".to_owned()),
        package: Some("google.api".to_owned()),
        message_type: vec![http, http_rule, custom_http_pattern],
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn annotations_proto() -> FileDescriptorProto {
    let mut http = message_field("http", HTTP_EXTENSION_NUMBER, ".google.api.HttpRule");
    http.extendee = Some(".google.protobuf.MethodOptions".to_owned());

    FileDescriptorProto {
        name: Some("google/api/annotations.proto".to_owned()),
        package: Some("google.api".to_owned()),
        dependency: vec![
            "google/api/http.proto".to_owned(),
            "google/protobuf/descriptor.proto".to_owned(),
        ],
        extension: vec![http],
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn httpbody_proto() -> FileDescriptorProto {
    let http_body = DescriptorProto {
        name: Some("HttpBody".to_owned()),
        field: vec![
            string_field("content_type", 1),
            scalar_field("data", 2, Type::Bytes),
            repeated(message_field("extensions", 3, ".google.protobuf.Any")),
        ],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("google/api/httpbody.proto".to_owned()),
        package: Some("google.api".to_owned()),
        dependency: vec!["google/protobuf/any.proto".to_owned()],
        message_type: vec![http_body],
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    }
}

fn string_field(name: &str, number: i32) -> FieldDescriptorProto {
    scalar_field(name, number, Type::String)
}

fn scalar_field(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::Message as i32),
        type_name: Some(type_name.to_owned()),
        ..Default::default()
    }
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

/// Marks `field` as a member of the message's first (and only) oneof.
fn oneof_member(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.oneof_index = Some(0);
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_pool_builds() {
        let pool = well_known_pool().expect("Failed to build the seed pool");

        for file in [
            "google/protobuf/descriptor.proto",
            "google/protobuf/any.proto",
            "google/api/http.proto",
            "google/api/annotations.proto",
            "google/api/httpbody.proto",
        ] {
            assert!(pool.get_file_by_name(file).is_some(), "missing seed file {file}");
        }
    }

    #[test]
    fn test_annotation_schema_is_resolvable() {
        let pool = well_known_pool().unwrap();

        assert!(pool.get_message_by_name("google.api.HttpRule").is_some());
        assert!(pool.get_message_by_name("google.api.CustomHttpPattern").is_some());
        assert!(pool.get_message_by_name("google.api.HttpBody").is_some());
        assert!(pool.get_message_by_name("google.protobuf.MethodOptions").is_some());
    }
}
