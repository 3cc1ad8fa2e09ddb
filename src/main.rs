fn main() {
    if let Err(err) = mermaid_export::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
