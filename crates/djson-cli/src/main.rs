fn main() {
    if let Err(err) = djson_cli::run_from_env() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
