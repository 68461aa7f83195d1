fn main() {
    inkpatch_cli::init_tracing();

    if let Err(error) = inkpatch_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
