//! Fetch and parse the public proxy list page.
//!
//! The source serves a single HTML table whose header row names the columns;
//! only the "IP Address" and "Port" columns are extracted.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{FetchError, ProxyEndpoint, ProxyPool};

/// Default proxy list source.
pub const DEFAULT_SOURCE_URL: &str = "https://sslproxies.org/";

/// Column header naming the proxy address.
const ADDRESS_COLUMN: &str = "IP Address";
/// Column header naming the proxy port.
const PORT_COLUMN: &str = "Port";

/// Fetch the source page and build the endpoint pool.
///
/// Any failure here (network, missing table, no usable rows) is returned to
/// the caller; proxy-mode runs must abort rather than fall back to a direct
/// connection.
pub async fn fetch_proxy_pool(url: &str) -> Result<ProxyPool, FetchError> {
    info!("Fetching proxy list from {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let response = client
        .get(url)
        .header("Accept-Language", "en-US,en;q=0.8")
        .header(
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        )
        .send()
        .await?
        .error_for_status()?;

    let body = response.text().await?;
    let endpoints = parse_proxy_table(&body)?;
    info!("Proxy pool built with {} endpoints", endpoints.len());
    Ok(ProxyPool::new(endpoints))
}

/// Extract endpoints from the page's proxy table.
pub(crate) fn parse_proxy_table(html: &str) -> Result<Vec<ProxyEndpoint>, FetchError> {
    let doc = Html::parse_document(html);
    let table_selector = Selector::parse("table").expect("static selector");
    let th_selector = Selector::parse("thead th").expect("static selector");
    let row_selector = Selector::parse("tbody tr").expect("static selector");
    let td_selector = Selector::parse("td").expect("static selector");

    let table = doc
        .select(&table_selector)
        .next()
        .ok_or_else(|| FetchError::Malformed("no table on page".into()))?;

    let headers: Vec<String> = table
        .select(&th_selector)
        .map(|th| th.text().collect::<String>().trim().to_string())
        .collect();

    let address_col = headers
        .iter()
        .position(|h| h == ADDRESS_COLUMN)
        .ok_or_else(|| FetchError::Malformed(format!("missing {:?} column", ADDRESS_COLUMN)))?;
    let port_col = headers
        .iter()
        .position(|h| h == PORT_COLUMN)
        .ok_or_else(|| FetchError::Malformed(format!("missing {:?} column", PORT_COLUMN)))?;

    let mut endpoints = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&td_selector)
            .map(|td| td.text().collect::<String>())
            .collect();

        let (Some(address), Some(port)) = (cells.get(address_col), cells.get(port_col)) else {
            debug!("Skipping short table row ({} cells)", cells.len());
            continue;
        };

        match ProxyEndpoint::parse(address, port) {
            Some(endpoint) => endpoints.push(endpoint),
            None => warn!("Skipping unparsable proxy row: {}:{}", address.trim(), port.trim()),
        }
    }

    if endpoints.is_empty() {
        return Err(FetchError::Malformed("no usable proxy rows".into()));
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="table">
          <thead><tr>
            <th>IP Address</th><th>Port</th><th>Code</th><th>Country</th>
            <th>Anonymity</th><th>Google</th><th>Https</th><th>Last Checked</th>
          </tr></thead>
          <tbody>
            <tr><td>203.0.113.10</td><td>8080</td><td>US</td><td>United States</td>
                <td>elite proxy</td><td>no</td><td>yes</td><td>1 min ago</td></tr>
            <tr><td>198.51.100.4</td><td>3128</td><td>DE</td><td>Germany</td>
                <td>anonymous</td><td>no</td><td>yes</td><td>2 mins ago</td></tr>
            <tr><td>not-an-ip</td><td>8080</td><td>--</td><td>--</td>
                <td>--</td><td>--</td><td>--</td><td>--</td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn parses_address_and_port_columns() {
        let endpoints = parse_proxy_table(PAGE).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].to_string(), "203.0.113.10:8080");
        assert_eq!(endpoints[1].to_string(), "198.51.100.4:3128");
    }

    #[test]
    fn missing_table_is_malformed() {
        let err = parse_proxy_table("<html><body><p>maintenance</p></body></html>").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn missing_expected_columns_is_malformed() {
        let page = r#"
            <table><thead><tr><th>Host</th><th>Port</th></tr></thead>
            <tbody><tr><td>203.0.113.1</td><td>80</td></tr></tbody></table>
        "#;
        let err = parse_proxy_table(page).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn all_rows_unparsable_is_malformed() {
        let page = r#"
            <table><thead><tr><th>IP Address</th><th>Port</th></tr></thead>
            <tbody><tr><td>nope</td><td>80</td></tr></tbody></table>
        "#;
        let err = parse_proxy_table(page).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
