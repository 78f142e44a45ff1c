fn main() {
    if let Err(err) = forward_viewer::run() {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}
