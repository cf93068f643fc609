use std::fs;
use std::io::stdin;

use rspotify::prelude::OAuthClient;
use rspotify::{scopes, AuthCodeSpotify, Credentials, OAuth};
use tracing::{info, warn};
use url::Url;

use crate::config::SpotifySettings;
use crate::error::{Result, SotdError};

/// Authorizes against Spotify, reusing the cached token when there is one.
pub async fn get_spotify_client(settings: &SpotifySettings) -> Result<AuthCodeSpotify> {
    let scopes = scopes!(
        "playlist-read-private",
        "playlist-modify-public",
        "playlist-modify-private"
    );

    let mut oauth = OAuth::default();
    oauth.scopes = scopes;
    oauth.redirect_uri = settings.redirect_uri.clone();

    let creds = Credentials::new(settings.client_id.as_str(), settings.client_secret.as_str());

    if let Some(dir) = settings.token_cache.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let config = rspotify::Config {
        token_cached: true,
        token_refreshing: true,
        cache_path: settings.token_cache.clone(),
        ..Default::default()
    };

    let mut spotify = AuthCodeSpotify::with_config(creds, oauth, config);

    match spotify.read_token_cache(true).await {
        Ok(Some(token)) => {
            let mut slot = spotify
                .token
                .lock()
                .await
                .map_err(|_| SotdError::Persistence("token cache lock poisoned".into()))?;
            *slot = Some(token);
        }
        Ok(None) => {
            handle_authorization_flow(&mut spotify).await?;
        }
        Err(e) => {
            warn!("Failed to read token cache: {}", e);
            handle_authorization_flow(&mut spotify).await?;
        }
    }

    Ok(spotify)
}

async fn handle_authorization_flow(spotify: &mut AuthCodeSpotify) -> Result<()> {
    let auth_url = spotify.get_authorize_url(true)?;

    if webbrowser::open(&auth_url).is_err() {
        println!(
            "Failed to open the authorization URL. Please visit the URL manually: {}",
            auth_url
        );
    }

    println!("Enter redirected url:");
    let mut url_input = String::new();
    stdin().read_line(&mut url_input)?;

    let code = authorization_code(&url_input)?;
    spotify.request_token(&code).await?;
    info!("authorized with Spotify");

    Ok(())
}

/// Pulls the `code` query parameter out of the redirect URL pasted by the user.
fn authorization_code(redirected: &str) -> Result<String> {
    let url = Url::parse(redirected.trim())
        .map_err(|e| SotdError::InvalidArgument(format!("not a redirect URL: {e}")))?;

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.trim().to_owned())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| SotdError::InvalidArgument("redirect URL has no authorization code".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_redirect() {
        let code = authorization_code("http://localhost:8888/callback?code=AQB123&state=xyz\n").unwrap();
        assert_eq!(code, "AQB123");
    }

    #[test]
    fn rejects_redirect_without_code() {
        assert!(authorization_code("http://localhost:8888/callback?error=access_denied").is_err());
        assert!(authorization_code("not a url").is_err());
    }
}
