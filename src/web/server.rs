use crate::analyzer::analyze;
use crate::config::{AppConfig, SynthesisOptions};
use crate::error::Result;
use crate::models::{Observation, SpecificationDocument};
use crate::synth::{OutputFormat, synthesize};
use serde::Deserialize;
use warp::http::StatusCode;
use warp::{Filter, Reply};

#[derive(Debug, Deserialize)]
pub struct SynthesisRequest {
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub options: SynthesisOptions,
}

#[derive(Debug, Default, Deserialize)]
struct FormatQuery {
    format: Option<OutputFormat>,
}

fn render(document: &SpecificationDocument, format: OutputFormat) -> warp::reply::Response {
    match format.render(document) {
        Ok(body) => warp::reply::with_header(body, "content-type", format.media_type()).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize document");
            warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

pub fn routes(
    options: SynthesisOptions,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let health_route = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({"status": "healthy"})));

    let analyze_route = warp::path!("analyze")
        .and(warp::post())
        .and(warp::body::json())
        .map(|observations: Vec<Observation>| {
            tracing::info!(observations = observations.len(), "analyze request");
            warp::reply::json(&analyze(&observations))
        });

    let synthesize_route = warp::path!("synthesize")
        .and(warp::post())
        .and(warp::query::<FormatQuery>())
        .and(warp::body::json())
        .map(move |query: FormatQuery, request: SynthesisRequest| {
            tracing::info!(observations = request.observations.len(), "synthesize request");
            let options = options.overridden_by(&request.options);
            let document = synthesize(&request.observations, &options);
            render(&document, query.format.unwrap_or(OutputFormat::Json))
        });

    health_route
        .or(analyze_route)
        .or(synthesize_route)
        .with(warp::cors().allow_any_origin())
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "server running");
    warp::serve(routes(config.synthesis)).run(addr).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_health() {
        let res = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&routes(SynthesisOptions::default()))
            .await;
        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_synthesize_json_with_request_options() {
        let base = SynthesisOptions {
            title: Some("Configured".into()),
            version: Some("2.0.0".into()),
            description: None,
        };
        let res = warp::test::request()
            .method("POST")
            .path("/synthesize")
            .json(&json!({
                "observations": [
                    {"url": "https://api.x.com/users/42", "method": "GET", "status": 200}
                ],
                "options": {"title": "From Request"}
            }))
            .reply(&routes(base))
            .await;
        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["info"]["title"], "From Request");
        assert_eq!(body["info"]["version"], "2.0.0");
        assert!(body["paths"]["/users/{id}"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_synthesize_yaml() {
        let res = warp::test::request()
            .method("POST")
            .path("/synthesize?format=yaml")
            .json(&json!({"observations": []}))
            .reply(&routes(SynthesisOptions::default()))
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "application/yaml");
        let text = std::str::from_utf8(res.body()).unwrap();
        assert!(text.contains("openapi:"));
        assert!(text.contains("3.0.3"));
    }

    #[tokio::test]
    async fn test_analyze() {
        let res = warp::test::request()
            .method("POST")
            .path("/analyze")
            .json(&json!([
                {"url": "https://api.x.com/users/1", "method": "GET"},
                {"url": "https://api.x.com/users/2", "method": "GET"}
            ]))
            .reply(&routes(SynthesisOptions::default()))
            .await;
        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["groups"].as_array().unwrap().len(), 1);
        assert_eq!(body["patterns"][1]["template"], "/users/{id}");
    }
}
