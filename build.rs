use std::{
  env,
  path::PathBuf,
};

fn main() {
  println!("cargo:rerun-if-changed=src/ffi.rs");
  println!("cargo:rerun-if-changed=cbindgen.toml");

  let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
  let crate_dir = PathBuf::from(crate_dir);

  let config = match cbindgen::Config::from_file(crate_dir.join("cbindgen.toml")) {
    Ok(config) => config,
    Err(err) => {
      println!("cargo:warning=failed to read cbindgen.toml: {err}");
      return;
    }
  };

  let output_dir = crate_dir.join("include");
  if let Err(err) = std::fs::create_dir_all(&output_dir) {
    println!("cargo:warning=failed to create include/: {err}");
    return;
  }

  match cbindgen::Builder::new()
    .with_crate(&crate_dir)
    .with_config(config)
    .generate()
  {
    Ok(bindings) => {
      bindings.write_to_file(output_dir.join("monobuf.h"));
    }
    Err(err) => println!("cargo:warning=cbindgen failed to generate bindings: {err}"),
  }
}
