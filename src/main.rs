use tubegrab_lib::cli::CliArgs;

#[tokio::main]
async fn main() {
    tubegrab_lib::init_logging();

    let result = match CliArgs::parse() {
        Ok(args) => tubegrab_lib::run(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
