//! MCP tool facade: translates tool calls into scraper operations and
//! serializes results as tagged success/failure JSON envelopes.

use crate::error::ScrapeError;
use crate::photos::{fetch_image_as_base64, DEFAULT_MAX_WIDTH};
use crate::scrapers::query::FilterCriteria;
use crate::scrapers::TurboScraper;
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How many listing photos a details response may carry.
const MAX_DETAIL_IMAGES: usize = 10;
/// JPEG quality for photos shipped inline over the protocol.
const DETAIL_IMAGE_QUALITY: u8 = 50;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SearchCarsArgs {
    /// Car make (e.g. BMW, Mercedes, Toyota)
    pub make: Option<String>,
    /// Car model (e.g. X5, E-Class, Camry)
    pub model: Option<String>,
    /// Minimum price (AZN)
    pub price_min: Option<u32>,
    /// Maximum price (AZN)
    pub price_max: Option<u32>,
    /// Minimum year of manufacture
    pub year_min: Option<u32>,
    /// Maximum year of manufacture
    pub year_max: Option<u32>,
    /// Fuel type: benzin, dizel, qaz, elektrik, hibrid, plug-in hibrid
    pub fuel_type: Option<String>,
    /// Transmission: mexaniki, avtomat, robot, variator
    pub transmission: Option<String>,
    /// Result count limit (default: 20)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCarDetailsArgs {
    /// Listing ID (e.g. 1234567) or full URL
    pub listing_id: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetMakesModelsArgs {
    /// Make name (to see its models). Leave empty for all makes.
    pub make: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetTrendingArgs {
    /// Category: new, popular, vip
    pub category: Option<String>,
    /// Result count (default: 20)
    pub limit: Option<usize>,
}

fn text_result(payload: &Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    CallToolResult::success(vec![Content::text(text)])
}

fn success_payload<T: serde::Serialize>(value: &T) -> Result<Value, McpError> {
    let mut payload =
        serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    payload["success"] = json!(true);
    Ok(payload)
}

fn failure_payload(err: &ScrapeError) -> Value {
    let mut payload = json!({ "success": false, "error": err.to_string() });
    if let ScrapeError::PageLoadTimeout { url } = err {
        if !url.is_empty() {
            payload["search_url"] = json!(url);
        }
    }
    payload
}

#[derive(Clone)]
pub struct TurboAzServer {
    tool_router: ToolRouter<Self>,
    scraper: Arc<TurboScraper>,
    http: reqwest::Client,
}

#[tool_router]
impl TurboAzServer {
    pub fn new() -> Result<Self, McpError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(Self {
            tool_router: Self::tool_router(),
            scraper: Arc::new(TurboScraper::new()),
            http,
        })
    }

    #[tool(
        description = "Car search on Turbo.az. Search by make, model, price range, year, fuel type and transmission."
    )]
    async fn search_cars(
        &self,
        params: Parameters<Option<SearchCarsArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        let criteria = FilterCriteria {
            make: args.make,
            model: args.model,
            price_min: args.price_min,
            price_max: args.price_max,
            year_min: args.year_min,
            year_max: args.year_max,
            fuel_type: args.fuel_type,
            transmission: args.transmission,
            limit: args.limit.unwrap_or(20),
        };
        let payload = match self.scraper.search_cars(criteria).await {
            Ok(report) => success_payload(&report)?,
            Err(err) => failure_payload(&err),
        };
        Ok(text_result(&payload))
    }

    #[tool(
        description = "Fetches detailed listing info from Turbo.az. Requires listing ID or URL. Returns up to 10 photos as image content."
    )]
    async fn get_car_details(
        &self,
        params: Parameters<GetCarDetailsArgs>,
    ) -> Result<CallToolResult, McpError> {
        let listing = params.0.listing_id;
        if listing.trim().is_empty() {
            return Ok(text_result(&json!({
                "success": false,
                "error": "listing_id is required",
            })));
        }

        match self.scraper.get_car_details(&listing).await {
            Ok(details) => {
                let payload = json!({ "success": true, "details": &details });
                let mut contents = vec![Content::text(
                    serde_json::to_string_pretty(&payload)
                        .unwrap_or_else(|_| payload.to_string()),
                )];
                for image_url in details.images.iter().take(MAX_DETAIL_IMAGES) {
                    if let Some((data, mime)) = fetch_image_as_base64(
                        &self.http,
                        image_url,
                        DEFAULT_MAX_WIDTH,
                        DETAIL_IMAGE_QUALITY,
                    )
                    .await
                    {
                        contents.push(Content::image(data, mime.to_string()));
                    }
                }
                Ok(CallToolResult::success(contents))
            }
            Err(err) => Ok(text_result(&failure_payload(&err))),
        }
    }

    #[tool(description = "Fetches list of available makes and models on Turbo.az.")]
    async fn get_makes_models(
        &self,
        params: Parameters<Option<GetMakesModelsArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        let payload = match self.scraper.get_makes_models(args.make).await {
            Ok(report) => success_payload(&report)?,
            Err(err) => failure_payload(&err),
        };
        Ok(text_result(&payload))
    }

    #[tool(description = "Fetches most popular/new listings on Turbo.az.")]
    async fn get_trending(
        &self,
        params: Parameters<Option<GetTrendingArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        let category = args.category.unwrap_or_else(|| "new".to_string());
        let limit = args.limit.unwrap_or(20);
        let payload = match self.scraper.get_trending(&category, limit).await {
            Ok(report) => success_payload(&report)?,
            Err(err) => failure_payload(&err),
        };
        Ok(text_result(&payload))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for TurboAzServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Turbo.az car search. Tools drive a headless browser, so allow a few seconds \
                 per call; every tool returns a JSON envelope with a success flag."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve the tool router over stdio until the client disconnects, then tear
/// down the browser session.
pub async fn serve_stdio() -> Result<(), McpError> {
    let server = TurboAzServer::new()?;
    let scraper = Arc::clone(&server.scraper);
    info!("Turbo.az MCP server starting...");
    let running = server
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    scraper.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MakesReport;

    #[test]
    fn timeout_failures_carry_the_attempted_url() {
        let err = ScrapeError::PageLoadTimeout {
            url: "https://turbo.az/autos?x=1".to_string(),
        };
        let payload = failure_payload(&err);
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["search_url"], json!("https://turbo.az/autos?x=1"));
    }

    #[test]
    fn make_not_found_failures_name_the_make() {
        let err = ScrapeError::MakeNotFound {
            name: "yugo".to_string(),
        };
        let payload = failure_payload(&err);
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["error"], json!("make not found: yugo"));
        assert!(payload.get("search_url").is_none());
    }

    #[test]
    fn makes_report_serializes_flat() {
        let all = success_payload(&MakesReport::AllMakes {
            makes: vec!["BMW".into()],
        })
        .unwrap();
        assert_eq!(all["makes"], json!(["BMW"]));
        assert_eq!(all["success"], json!(true));

        let one = success_payload(&MakesReport::ModelsForMake {
            make: "Toyota".into(),
            models: vec!["Camry".into()],
        })
        .unwrap();
        assert_eq!(one["make"], json!("Toyota"));
        assert_eq!(one["models"], json!(["Camry"]));
    }
}
