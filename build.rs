fn main() -> Result<(), Box<dyn std::error::Error>> {
    let protos = [
        "proto/graph.proto",
        "proto/signature.proto",
        "proto/runtime.proto",
        "proto/worker.proto",
    ];

    tonic_prost_build::configure().compile_protos(&protos, &["proto"])?;

    // Tell cargo to rerun if any proto file changes
    for proto in protos {
        println!("cargo:rerun-if-changed={}", proto);
    }

    Ok(())
}
