use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating google.api annotation types...");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out_dir = manifest_dir.join("src/annotations/generated");

    let proto_folder = manifest_dir.join("proto");
    let proto_files = [
        proto_folder.join("google/api/http.proto"),
        proto_folder.join("google/api/annotations.proto"),
        proto_folder.join("google/api/httpbody.proto"),
    ];

    if !out_dir.exists() {
        fs::create_dir_all(&out_dir)?;
    }

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(false)
        .out_dir(&out_dir)
        .compile_protos(&proto_files, &[proto_folder])
        .unwrap();

    println!("Done! Generated files are in src/annotations/generated");

    Ok(())
}
