fn main() {
    if let Err(e) = unitload_cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
