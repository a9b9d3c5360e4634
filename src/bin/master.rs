//! Master entry point: builds the configuration, connects to the queue,
//! and runs the seeder to completion.

use std::sync::Arc;

use distcrawl::config::Config;
use distcrawl::queue::RedisQueue;
use distcrawl::seeder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("master: connecting to queue at {}", config.redis_url);
    let queue = Arc::new(RedisQueue::connect(&config.redis_url).await?);

    seeder::run(&config, queue).await?;
    Ok(())
}
