//! Turns resolved break groups into an ordered splice plan and applies it.
//!
//! Operations are produced in timeline order and applied in the reverse
//! order, latest position first. Every insertion shifts the segments after
//! it; going backwards keeps the positions of the not-yet-applied earlier
//! operations valid.

use crate::codec::CodecError;
use crate::error::Result;
use crate::model::BreakDescriptor;
use crate::splice::{InterstitialOptions, SpliceEngine};
use crate::stitcher::asset_list::{self, AssetItem, AssetListPayload};
use crate::stitcher::grouping::{GroupingMode, group_breaks};
use tracing::{debug, info};

/// One step of a splice plan
#[derive(Debug, Clone, PartialEq)]
pub enum SpliceOperation {
    /// Splice ad content straight into the segment timeline
    DirectAdSplice { pos: u64, ad_uri: String },
    /// Overlay an HLS interstitial at `pos`
    InterstitialInsertion {
        pos: u64,
        id: String,
        asset_list_uri: String,
        is_asset_list: bool,
        options: InterstitialOptions,
    },
}

impl SpliceOperation {
    pub fn pos(&self) -> u64 {
        match self {
            SpliceOperation::DirectAdSplice { pos, .. }
            | SpliceOperation::InterstitialInsertion { pos, .. } => *pos,
        }
    }
}

/// Interstitial flags carried in the `i` and `c` query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestrationFlags {
    pub use_interstitial: bool,
    pub combine_interstitial: bool,
}

impl OrchestrationFlags {
    fn grouping_mode(self) -> GroupingMode {
        if self.combine_interstitial {
            GroupingMode::Combine
        } else if self.use_interstitial {
            GroupingMode::InterstitialOnly
        } else {
            GroupingMode::Plain
        }
    }
}

/// Request-scoped inputs for building a plan
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    /// Prepended to locally generated asset-list links when set
    pub asset_list_base_url: Option<&'a str>,
    /// Route prefix of this service, e.g. `/stitch`
    pub prefix: &'a str,
    /// Wall-clock milliseconds folded into interstitial ids
    pub now_ms: i64,
}

/// Build the splice plan for `breaks`, in timeline order.
pub fn build_plan(
    breaks: &[BreakDescriptor],
    flags: OrchestrationFlags,
    ctx: &PlanContext<'_>,
) -> std::result::Result<Vec<SpliceOperation>, CodecError> {
    if !flags.use_interstitial && !flags.combine_interstitial {
        return Ok(breaks
            .iter()
            .filter_map(|b| match &b.url {
                Some(url) => Some(SpliceOperation::DirectAdSplice {
                    pos: b.pos,
                    ad_uri: url.clone(),
                }),
                None => {
                    debug!("Skipping break at {}ms: nothing to splice", b.pos);
                    None
                }
            })
            .collect());
    }

    let groups = group_breaks(breaks, flags.grouping_mode());
    let mut plan = Vec::with_capacity(breaks.len() + groups.len());
    let mut next_id = groups.len() + 1;
    let mut previous_break_duration = 0u64;

    for (index, (&pos, members)) in groups.iter().enumerate() {
        let break_duration: u64 = members.iter().filter_map(|m| m.duration).sum();
        let mut options = InterstitialOptions {
            resume_offset: Some(0),
            ..Default::default()
        };
        let mut splices = Vec::new();

        for member in members {
            fold_tuning(&mut options, member);
            if flags.use_interstitial {
                options.planned_duration = member.duration;
            }
            if flags.combine_interstitial
                && let Some(url) = &member.url
            {
                splices.push(SpliceOperation::DirectAdSplice {
                    pos,
                    ad_uri: url.clone(),
                });
            }
        }
        if flags.combine_interstitial {
            options.resume_offset = Some(break_duration);
        }

        let external = members.iter().find_map(|m| m.asset_list_url.clone());
        let asset_list_uri = match external {
            Some(uri) => {
                if flags.combine_interstitial {
                    options.planned_duration = Some(break_duration);
                }
                uri
            }
            None => {
                options.planned_duration = Some(break_duration);
                options.add_delta_offset = Some(index != 0);
                let payload = AssetListPayload {
                    assets: members
                        .iter()
                        .filter_map(|m| {
                            m.url
                                .as_ref()
                                .map(|u| AssetItem::from_millis(u.as_str(), m.duration.unwrap_or(0)))
                        })
                        .collect(),
                };
                let token = asset_list::encode(&payload)?;
                asset_list::discovery_url(ctx.asset_list_base_url, ctx.prefix, &token)
            }
        };

        if flags.combine_interstitial {
            options.previous_break_duration = Some(previous_break_duration);
            options.add_delta_offset = Some(index != 0);
        }

        next_id -= 1;
        let id = format!("Ad-Break-{}.{}", next_id, ctx.now_ms);
        debug!(
            "Planned interstitial {} at {}ms ({}ms, {} member(s))",
            id,
            pos,
            break_duration,
            members.len()
        );

        plan.push(SpliceOperation::InterstitialInsertion {
            pos,
            id,
            asset_list_uri,
            is_asset_list: true,
            options,
        });
        plan.extend(splices);
        previous_break_duration = break_duration;
    }

    Ok(plan)
}

/// Last writer wins across members of a group
fn fold_tuning(options: &mut InterstitialOptions, member: &BreakDescriptor) {
    let t = &member.tuning;
    if t.playout_limit.is_some() {
        options.playout_limit = t.playout_limit;
    }
    if t.cue.is_some() {
        options.cue = t.cue.clone();
    }
    if t.snap.is_some() {
        options.snap = t.snap.clone();
    }
    if t.resume_offset.is_some() {
        options.resume_offset = t.resume_offset;
    }
    if t.restrict.is_some() {
        options.restrict = t.restrict.clone();
    }
    if t.content_may_vary.is_some() {
        options.content_may_vary = t.content_may_vary.clone();
    }
    if t.timeline_occupies.is_some() {
        options.timeline_occupies = t.timeline_occupies.clone();
    }
    if t.timeline_style.is_some() {
        options.timeline_style = t.timeline_style.clone();
    }
    if t.custom_beacon.is_some() {
        options.custom_beacon = t.custom_beacon.clone();
    }
}

/// Apply `plan` to `engine`, strictly one operation at a time and in reverse
/// production order.
pub async fn execute_plan(
    engine: &mut dyn SpliceEngine,
    plan: Vec<SpliceOperation>,
) -> Result<()> {
    info!("Applying {} splice operation(s)", plan.len());

    for op in plan.into_iter().rev() {
        match op {
            SpliceOperation::DirectAdSplice { pos, ad_uri } => {
                debug!("Splicing ad at {}ms: {}", pos, ad_uri);
                engine.insert_ad_at(pos, &ad_uri).await?;
            }
            SpliceOperation::InterstitialInsertion {
                pos,
                id,
                asset_list_uri,
                is_asset_list,
                options,
            } => {
                debug!("Inserting interstitial {} at {}ms", id, pos);
                engine
                    .insert_interstitial_at(pos, &id, &asset_list_uri, is_asset_list, &options)
                    .await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BreakTuning;
    use async_trait::async_trait;

    const AD: &str = "https://maitv-vod.lab.eyevinn.technology/ads/apotea-15s.mp4/master.m3u8";
    const AD_LIST_15: &str = "https://mock.com/stitch/assetlist/eyJhc3NldHMiOlt7InVyaSI6Imh0dHBzOi8vbWFpdHYtdm9kLmxhYi5leWV2aW5uLnRlY2hub2xvZ3kvYWRzL2Fwb3RlYS0xNXMubXA0L21hc3Rlci5tM3U4IiwiZHVyIjoxNX1dfQ%3D%3D";

    fn ctx() -> PlanContext<'static> {
        PlanContext {
            asset_list_base_url: Some("https://mock.com"),
            prefix: "/stitch",
            now_ms: 1_700_000_000_000,
        }
    }

    fn ad(pos: u64) -> BreakDescriptor {
        BreakDescriptor {
            pos,
            duration: Some(15000),
            url: Some(AD.to_string()),
            ..Default::default()
        }
    }

    const INTERSTITIAL: OrchestrationFlags = OrchestrationFlags {
        use_interstitial: true,
        combine_interstitial: false,
    };
    const COMBINE: OrchestrationFlags = OrchestrationFlags {
        use_interstitial: false,
        combine_interstitial: true,
    };

    fn interstitials(plan: &[SpliceOperation]) -> Vec<(&str, &str, &InterstitialOptions)> {
        plan.iter()
            .filter_map(|op| match op {
                SpliceOperation::InterstitialInsertion {
                    id,
                    asset_list_uri,
                    options,
                    ..
                } => Some((id.as_str(), asset_list_uri.as_str(), options)),
                _ => None,
            })
            .collect()
    }

    /// Records every call so ordering can be asserted
    #[derive(Default)]
    struct RecordingEngine {
        calls: Vec<(String, u64)>,
    }

    #[async_trait]
    impl SpliceEngine for RecordingEngine {
        async fn insert_ad_at(&mut self, pos_ms: u64, _ad_uri: &str) -> Result<()> {
            self.calls.push(("ad".to_string(), pos_ms));
            Ok(())
        }

        async fn insert_interstitial_at(
            &mut self,
            pos_ms: u64,
            _id: &str,
            _uri: &str,
            _is_asset_list: bool,
            _options: &InterstitialOptions,
        ) -> Result<()> {
            self.calls.push(("interstitial".to_string(), pos_ms));
            Ok(())
        }

        fn media_manifest(&self, _bandwidth: u64) -> Result<String> {
            Ok(String::new())
        }

        fn audio_manifest(&self, _group_id: &str, _language: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn plain_mode_splices_every_descriptor_in_order() {
        let breaks = vec![ad(30000), ad(0), ad(30000)];
        let plan = build_plan(&breaks, OrchestrationFlags::default(), &ctx()).unwrap();

        let positions: Vec<u64> = plan.iter().map(SpliceOperation::pos).collect();
        assert_eq!(positions, vec![30000, 0, 30000]);
        assert!(
            plan.iter()
                .all(|op| matches!(op, SpliceOperation::DirectAdSplice { .. }))
        );
    }

    #[test]
    fn plain_mode_skips_asset_list_only_descriptors() {
        let breaks = vec![BreakDescriptor {
            pos: 0,
            asset_list_url: Some("https://ads.example.com/list.json".into()),
            ..Default::default()
        }];
        let plan = build_plan(&breaks, OrchestrationFlags::default(), &ctx()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn interstitial_builds_local_asset_list() {
        let plan = build_plan(&[ad(0)], INTERSTITIAL, &ctx()).unwrap();
        assert_eq!(plan.len(), 1);

        let (id, uri, opts) = interstitials(&plan)[0];
        assert_eq!(id, "Ad-Break-1.1700000000000");
        assert_eq!(uri, AD_LIST_15);
        assert_eq!(opts.planned_duration, Some(15000));
        assert_eq!(opts.resume_offset, Some(0));
        assert_eq!(opts.add_delta_offset, Some(false));
        assert_eq!(opts.previous_break_duration, None);
    }

    #[test]
    fn ids_count_down_from_group_count() {
        let plan = build_plan(&[ad(0), ad(13000), ad(55000)], INTERSTITIAL, &ctx()).unwrap();
        let ids: Vec<&str> = interstitials(&plan).iter().map(|(id, _, _)| *id).collect();
        assert_eq!(
            ids,
            vec![
                "Ad-Break-3.1700000000000",
                "Ad-Break-2.1700000000000",
                "Ad-Break-1.1700000000000"
            ]
        );
    }

    #[test]
    fn tuning_fields_fold_into_group_options() {
        let mut first = ad(0);
        first.tuning = BreakTuning {
            resume_offset: Some(5000),
            ..Default::default()
        };
        let mut second = ad(55000);
        second.tuning = BreakTuning {
            playout_limit: Some(10000),
            snap: Some("OUT".into()),
            ..Default::default()
        };
        let mut second_b = ad(55000);
        second_b.tuning = BreakTuning {
            snap: Some("IN,OUT".into()),
            timeline_style: Some("PRIMARY".into()),
            ..Default::default()
        };

        let plan = build_plan(&[first, second, second_b], INTERSTITIAL, &ctx()).unwrap();
        let found = interstitials(&plan);

        assert_eq!(found[0].2.resume_offset, Some(5000));
        assert_eq!(found[0].2.playout_limit, None);

        let opts = found[1].2;
        assert_eq!(opts.resume_offset, Some(0));
        assert_eq!(opts.playout_limit, Some(10000));
        assert_eq!(opts.snap.as_deref(), Some("IN,OUT"), "last writer wins");
        assert_eq!(opts.timeline_style.as_deref(), Some("PRIMARY"));
        assert_eq!(opts.planned_duration, Some(30000));
    }

    #[test]
    fn external_asset_list_is_used_verbatim() {
        let breaks = vec![
            BreakDescriptor {
                pos: 0,
                duration: Some(20000),
                asset_list_url: Some("https://ads.example.com/list.json".into()),
                ..Default::default()
            },
            ad(0),
        ];
        let plan = build_plan(&breaks, INTERSTITIAL, &ctx()).unwrap();
        assert_eq!(plan.len(), 1);

        let (_, uri, opts) = interstitials(&plan)[0];
        assert_eq!(uri, "https://ads.example.com/list.json");
        assert_eq!(opts.planned_duration, Some(20000));
        assert_eq!(opts.add_delta_offset, None);
    }

    #[test]
    fn combine_splices_and_overlays_each_group() {
        let plan = build_plan(&[ad(0), ad(55000)], COMBINE, &ctx()).unwrap();

        let kinds: Vec<(&str, u64)> = plan
            .iter()
            .map(|op| match op {
                SpliceOperation::DirectAdSplice { pos, .. } => ("ad", *pos),
                SpliceOperation::InterstitialInsertion { pos, .. } => ("interstitial", *pos),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("interstitial", 0),
                ("ad", 0),
                ("interstitial", 55000),
                ("ad", 55000)
            ]
        );

        let found = interstitials(&plan);
        assert_eq!(found[0].2.resume_offset, Some(15000));
        assert_eq!(found[0].2.previous_break_duration, Some(0));
        assert_eq!(found[0].2.add_delta_offset, Some(false));
        assert_eq!(found[1].2.resume_offset, Some(15000));
        assert_eq!(found[1].2.previous_break_duration, Some(15000));
        assert_eq!(found[1].2.add_delta_offset, Some(true));
        assert_eq!(found[1].2.planned_duration, Some(15000));
    }

    #[test]
    fn combine_with_external_asset_list_forces_planned_duration() {
        let breaks = vec![
            BreakDescriptor {
                pos: 0,
                asset_list_url: Some("https://ads.example.com/list.json".into()),
                ..Default::default()
            },
            ad(0),
            ad(0),
        ];
        let plan = build_plan(&breaks, COMBINE, &ctx()).unwrap();

        let (_, uri, opts) = interstitials(&plan)[0];
        assert_eq!(uri, "https://ads.example.com/list.json");
        assert_eq!(opts.planned_duration, Some(30000));
        assert_eq!(opts.resume_offset, Some(30000));
        let ads = plan
            .iter()
            .filter(|op| matches!(op, SpliceOperation::DirectAdSplice { .. }))
            .count();
        assert_eq!(ads, 2);
    }

    #[tokio::test]
    async fn plan_executes_latest_position_first() {
        let plan = build_plan(&[ad(0), ad(13000), ad(55000)], INTERSTITIAL, &ctx()).unwrap();
        let mut engine = RecordingEngine::default();
        execute_plan(&mut engine, plan).await.unwrap();

        let positions: Vec<u64> = engine.calls.iter().map(|(_, p)| *p).collect();
        assert_eq!(positions, vec![55000, 13000, 0]);
    }

    #[tokio::test]
    async fn plain_plan_executes_in_reverse_production_order() {
        let plan = build_plan(&[ad(0), ad(13000), ad(55000)], OrchestrationFlags::default(), &ctx())
            .unwrap();
        let mut engine = RecordingEngine::default();
        execute_plan(&mut engine, plan).await.unwrap();

        assert_eq!(
            engine.calls,
            vec![
                ("ad".to_string(), 55000),
                ("ad".to_string(), 13000),
                ("ad".to_string(), 0)
            ]
        );
    }

    #[tokio::test]
    async fn combined_plan_splices_before_overlaying_each_group() {
        let plan = build_plan(&[ad(0), ad(55000)], COMBINE, &ctx()).unwrap();
        let mut engine = RecordingEngine::default();
        execute_plan(&mut engine, plan).await.unwrap();

        assert_eq!(
            engine.calls,
            vec![
                ("ad".to_string(), 55000),
                ("interstitial".to_string(), 55000),
                ("ad".to_string(), 0),
                ("interstitial".to_string(), 0)
            ]
        );
    }
}
