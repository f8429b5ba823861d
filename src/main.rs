use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match causerie::Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(2);
        }
    };

    if let Err(err) = causerie::run(config).await {
        eprintln!("fatal: {}", err);
        process::exit(1);
    }
}
