#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(e) = raycaster::run() {
        log::error!("{}", e);
        eprintln!("raycaster: {e}");
        std::process::exit(1);
    }
}

// The web build starts from `raycaster::start`.
#[cfg(target_arch = "wasm32")]
fn main() {}
