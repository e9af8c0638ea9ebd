fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/sandbox.proto");
    tonic_build::configure().compile(&["proto/sandbox.proto"], &["proto"])?;
    Ok(())
}
