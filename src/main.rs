fn main() {
    if let Err(err) = sruja_layout::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
