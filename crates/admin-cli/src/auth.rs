//! Admin login, logout and session status

use anyhow::{bail, Result};
use std::io::{BufRead, Write};

use crate::{api::ApiClient, config::Config};

/// Password from the flag, then WEDDING_ADMIN_PASSWORD (via clap), then stdin
fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("No password given");
    }
    Ok(password)
}

pub async fn login(config: &mut Config, server: &str, email: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let client = ApiClient::new(server, None);
    let response = client.login(email, &password).await?;

    config.server = Some(server.to_string());
    config.token = Some(response.token);
    config.save()?;

    println!("\x1b[1;32m✅ Logged in as {} <{}>\x1b[0m", response.name, response.email);
    println!("\x1b[90mSession expires {}\x1b[0m", response.expires_at);
    Ok(())
}

/// Invalidates the session on the server, then forgets the local token
pub async fn logout(config: &mut Config, server: &str) -> Result<()> {
    let Some(token) = config.token.clone() else {
        println!("Not logged in");
        return Ok(());
    };

    if let Err(e) = ApiClient::new(server, Some(token)).logout().await {
        tracing::warn!("Server logout failed: {}", e);
    }
    config.token = None;
    config.save()?;
    println!("\x1b[32m✅ Logged out\x1b[0m");
    Ok(())
}

pub async fn whoami(config: &Config, server: &str) -> Result<()> {
    let Some(token) = config.token.clone() else {
        println!("\x1b[33m✗ Not logged in\x1b[0m");
        println!("Run '\x1b[1mwedding-admin login --email <email>\x1b[0m' to authenticate");
        return Ok(());
    };

    let session = ApiClient::new(server, Some(token)).session().await?;
    println!("\x1b[32m✓ Logged in\x1b[0m as {} <{}>", session.name, session.email);
    println!("Server: {}", server);
    println!("Session expires: {}", session.expires_at);
    Ok(())
}
