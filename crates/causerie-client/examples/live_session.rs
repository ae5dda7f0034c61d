//! Log in against a running backend, open a session, and dump one
//! conversation.
//!
//! ```sh
//! BACKEND_API_URL=http://localhost:5000 \
//! CAUSERIE_EMAIL=ada@example.com CAUSERIE_PASSWORD=secret \
//! cargo run -p causerie-client --example live_session
//! ```

use std::time::Duration;

use causerie_client::{init_tracing, ChatClient, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let email = std::env::var("CAUSERIE_EMAIL")?;
    let password = std::env::var("CAUSERIE_PASSWORD")?;

    let client = ChatClient::new(ClientConfig::from_env())?;

    let me = client.login(&email, &password).await?;
    println!("Logged in as {} <{}>", me.name, me.email);

    client.connect().await?;

    let users = client.refresh_users().await?;
    println!("{} contacts:", users.len());
    for user in &users {
        println!("  {:<20} {:?}", user.name, user.status);
    }

    if let Some(peer) = users.iter().find(|u| u.id != me.id) {
        client.open_conversation(&peer.id).await?;

        // Give the session a moment to fold in anything live.
        tokio::time::sleep(Duration::from_secs(2)).await;

        println!("--- conversation with {} ---", peer.name);
        for message in client.messages_with(&peer.id) {
            println!("[{}] {}: {}", message.timestamp, message.sender_id, message.content);
        }
    }

    client.disconnect().await;
    Ok(())
}
