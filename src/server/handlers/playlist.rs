use crate::{
    codec,
    error::{Result, StitchError},
    hls::master::{MasterRewriteOptions, rewrite_master},
    model::StitchInstruction,
    server::state::AppState,
    splice::{
        SpliceEngine,
        vod::{HlsVod, VodOptions},
    },
    stitcher::orchestrator::{OrchestrationFlags, PlanContext, build_plan, execute_plan},
};
use axum::{
    extract::{Query, State},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

/// Query parameters shared by the playlist endpoints
#[derive(Debug, Default, Deserialize)]
pub struct StitchQuery {
    pub payload: Option<String>,
    pub bw: Option<String>,
    pub groupid: Option<String>,
    pub language: Option<String>,
    pub subdir: Option<String>,
    pub i: Option<String>,
    pub c: Option<String>,
    pub f: Option<String>,
}

impl StitchQuery {
    /// The instruction token, with spaces a query decoder made of `+`
    /// turned back
    fn token(&self) -> Result<String> {
        self.payload
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| p.replace(' ', "+"))
            .ok_or_else(|| StitchError::Validation("Missing payload in request".to_string()))
    }

    fn flags(&self) -> OrchestrationFlags {
        OrchestrationFlags {
            use_interstitial: self.i.as_deref() == Some("1"),
            combine_interstitial: self.c.as_deref() == Some("1"),
        }
    }

    fn bandwidth(&self) -> u64 {
        self.bw
            .as_deref()
            .and_then(|bw| bw.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Serve the source master playlist rewritten to route through this service
pub async fn serve_master(
    Query(params): Query<StitchQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = master(&params, &state).await;
    super::observe("master", start, result)
}

async fn master(params: &StitchQuery, state: &AppState) -> Result<Response> {
    let token = params.token()?;
    let instruction: StitchInstruction = codec::decode(&token)?;
    info!("Serving master playlist for {}", instruction.uri);

    let text = state.fetcher.text(&instruction.uri).await?;
    let flags = params.flags();
    let options = MasterRewriteOptions {
        use_interstitial: flags.use_interstitial,
        combine_interstitial: flags.combine_interstitial,
        no_subtitles: params.f.as_deref() == Some("nosubtitles"),
    };

    let body = rewrite_master(&text, &token, &options, &state.config.prefix);
    Ok(super::playlist_response(body))
}

/// Load the source and apply every break in the instruction to it
async fn stitched_vod(params: &StitchQuery, state: &AppState) -> Result<HlsVod> {
    let token = params.token()?;
    let instruction: StitchInstruction = codec::decode(&token)?;
    let flags = params.flags();

    let source = Url::parse(&instruction.uri)
        .map_err(|e| StitchError::Validation(format!("Invalid uri in payload: {}", e)))?;
    let options = VodOptions::for_source(&source, params.subdir.as_deref())?;
    let mut vod = HlsVod::load(state.fetcher.clone(), &instruction.uri, options).await?;

    let ctx = PlanContext {
        asset_list_base_url: state.config.asset_list_base_url.as_deref(),
        prefix: &state.config.prefix,
        now_ms: Utc::now().timestamp_millis(),
    };
    let plan = build_plan(&instruction.breaks, flags, &ctx)?;
    debug!("Applying {} splice operations ({:?})", plan.len(), flags);

    execute_plan(&mut vod, plan).await?;
    Ok(vod)
}

/// Serve the stitched media playlist of the variant closest to `bw`
pub async fn serve_media(
    Query(params): Query<StitchQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = async {
        let bandwidth = params.bandwidth();
        info!("Serving media playlist (bw={})", bandwidth);
        let vod = stitched_vod(&params, &state).await?;
        Ok::<_, StitchError>(super::playlist_response(vod.media_manifest(bandwidth)?))
    }
    .await;
    super::observe("media", start, result)
}

/// Serve the stitched audio rendition playlist for a group and language
pub async fn serve_audio(
    Query(params): Query<StitchQuery>,
    State(state): State<AppState>,
) -> Result<Response> {
    let start = Instant::now();
    let result = async {
        let group_id = params.groupid.as_deref().unwrap_or_default();
        let language = params.language.as_deref().unwrap_or_default();
        info!(
            "Serving audio playlist (groupid={}, language={})",
            group_id, language
        );
        let vod = stitched_vod(&params, &state).await?;
        Ok::<_, StitchError>(super::playlist_response(
            vod.audio_manifest(group_id, language)?,
        ))
    }
    .await;
    super::observe("audio", start, result)
}
