fn main() {
    #[cfg(feature = "cutt")]
    {
        // Link against libcutt and the CUDA runtime.
        // CUTT_LIB_DIR points at the directory holding libcutt.{so,a}.
        println!("cargo:rerun-if-env-changed=CUTT_LIB_DIR");
        println!("cargo:rerun-if-env-changed=CUDA_PATH");
        if let Ok(lib_dir) = std::env::var("CUTT_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", lib_dir);
        }
        if let Ok(cuda) = std::env::var("CUDA_PATH") {
            println!("cargo:rustc-link-search=native={}/lib64", cuda);
        } else if cfg!(target_os = "linux") {
            println!("cargo:rustc-link-search=native=/usr/local/cuda/lib64");
        }
        println!("cargo:rustc-link-lib=cutt");
        println!("cargo:rustc-link-lib=cudart");
    }
}
