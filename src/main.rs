#[tokio::main]
async fn main() {
  if let Err(e) = elite_score_lib::run().await {
    eprintln!("elite-score: {}", e);
    std::process::exit(1);
  }
}
