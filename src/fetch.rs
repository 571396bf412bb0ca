// src/fetch.rs

use reqwest::Client;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::index::Dataset;
use crate::row::{normalize, parse_table};

/// Default dataset: the plotly gapminder-unfiltered CSV.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/plotly/datasets/master/gapminder_unfiltered.csv";

/// GET the dataset payload as UTF-8 text. Any non-success status is a
/// `FetchFailure` carrying the status code.
pub async fn fetch_dataset_text(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|err| Error::FetchFailure {
            status: None,
            detail: err.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::FetchFailure {
            status: Some(status.as_u16()),
            detail: format!("HTTP {}", status),
        });
    }

    response.text().await.map_err(|err| Error::FetchFailure {
        status: Some(status.as_u16()),
        detail: err.to_string(),
    })
}

/// Fetch, parse and index the dataset in one step. Nothing is committed on
/// failure; the caller either gets a complete `Dataset` or an error.
pub async fn load_dataset(client: &Client, url: &Url) -> Result<Dataset> {
    let text = fetch_dataset_text(client, url).await?;
    let records = parse_table(&text)?;
    let rows = normalize(&records);
    info!(rows = rows.len(), "dataset loaded");
    Ok(Dataset::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on an ephemeral port.
    async fn serve_once(response: String) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
        });
        Url::parse(&format!("http://{}/", addr)).expect("url")
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_failure_with_code() {
        let url = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\n\
             content-length: 0\r\nconnection: close\r\n\r\n"
                .to_string(),
        )
        .await;

        let err = fetch_dataset_text(&Client::new(), &url).await.unwrap_err();
        match err {
            Error::FetchFailure { status, detail } => {
                assert_eq!(status, Some(500));
                assert!(detail.contains("500"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn successful_fetch_yields_a_complete_dataset() {
        let body = "country,continent,year,lifeExp,pop,gdpPercap,iso_alpha,iso_num\n\
                    Canada,Americas,2007,80.653,33390141,36319.235,CAN,124\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/csv\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let url = serve_once(response).await;

        let dataset = load_dataset(&Client::new(), &url).await.expect("load");
        assert_eq!(dataset.index().countries(), ["Canada"]);
        assert_eq!(dataset.rows().len(), 1);
    }
}
