//! Out-of-band API key creation.
//!
//! Generates a key, persists only its hash, and prints the plaintext once.
//! Runs against the same database the server reads; no server restart is
//! needed for a new key to authenticate.

use clap::Parser;

use switchboard::auth::{KeyStore, SqliteKeyStore, generate_api_key};
use switchboard::config::Settings;
use switchboard::hashing::hash_api_key;

#[derive(Parser)]
#[command(
    name = "create-key",
    about = "Create a gateway API key for an owner and print it once"
)]
struct Args {
    /// Owner label recorded with the key (e.g. an email address).
    owner: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = Settings::from_env()?;

    let store = SqliteKeyStore::connect(&settings.database_url).await?;

    let plaintext = generate_api_key();
    let record = store.insert(&hash_api_key(&plaintext), &args.owner).await?;

    println!("API key created for owner '{}':", record.owner);
    println!("  => {plaintext}");
    println!();
    println!("IMPORTANT: save this key securely - it will not be shown again.");
    println!("  Key ID:  {}", record.id);
    println!("  Created: {}", record.created_at);
    println!(
        "  Status:  {}",
        if record.is_active { "Active" } else { "Inactive" }
    );

    Ok(())
}
