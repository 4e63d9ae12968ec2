use crate::match_key::{sidecar_key, MatchKey};
use crate::normalize::time_instant;
use crate::scanner::MediaAsset;
use crate::sidecar::RawSidecar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TYPICAL_SIDECAR_BYTES: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Exact,
    Truncated,
    DuplicateResolved,
    Unmatched,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPair {
    pub asset: MediaAsset,
    pub sidecar: Option<RawSidecar>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchStats {
    pub exact: usize,
    pub truncated: usize,
    pub duplicate_resolved: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub album_sidecars: usize,
    pub unbound_sidecars: usize,
}

struct SidecarEntry {
    sidecar: RawSidecar,
    used: bool,
}

pub fn match_assets(
    assets: Vec<MediaAsset>,
    sidecars: Vec<RawSidecar>,
    extra_suffixes: &[String],
) -> (Vec<MatchedPair>, MatchStats) {
    let mut stats = MatchStats::default();

    let mut entries = Vec::<SidecarEntry>::new();
    let mut sidecar_groups = BTreeMap::<MatchKey, Vec<usize>>::new();
    let mut sorted_sidecars = sidecars;
    sorted_sidecars.sort_by(|a, b| a.path.cmp(&b.path));
    for sidecar in sorted_sidecars {
        if sidecar.album {
            stats.album_sidecars += 1;
            continue;
        }
        let key = sidecar_key(sidecar.title.as_deref(), sidecar.file_name(), extra_suffixes);
        let index = entries.len();
        entries.push(SidecarEntry {
            sidecar,
            used: false,
        });
        if let Some(key) = key {
            sidecar_groups.entry(key).or_default().push(index);
        }
    }

    let mut asset_groups = BTreeMap::<MatchKey, Vec<MediaAsset>>::new();
    for asset in assets {
        asset_groups.entry(asset.key.clone()).or_default().push(asset);
    }
    for group in asset_groups.values_mut() {
        group.sort_by(|a, b| a.path.cmp(&b.path));
    }

    let mut pairs = Vec::new();
    for (key, group) in asset_groups {
        match sidecar_groups.get(&key) {
            Some(candidates) => {
                let candidates = candidates.clone();
                resolve_key_group(group, &candidates, &mut entries, &mut pairs, &mut stats);
            }
            None => {
                for asset in group {
                    resolve_truncated(asset, &sidecar_groups, &mut entries, &mut pairs, &mut stats);
                }
            }
        }
    }

    stats.unbound_sidecars = entries.iter().filter(|entry| !entry.used).count();
    pairs.sort_by(|a, b| a.asset.path.cmp(&b.asset.path));
    (pairs, stats)
}

fn resolve_key_group(
    group: Vec<MediaAsset>,
    candidates: &[usize],
    entries: &mut [SidecarEntry],
    pairs: &mut Vec<MatchedPair>,
    stats: &mut MatchStats,
) {
    if group.len() == 1 && candidates.len() == 1 {
        let asset = group.into_iter().next().expect("single asset");
        bind(asset, candidates[0], Confidence::Exact, entries, pairs, stats);
        return;
    }

    if candidates.len() == 1 {
        resolve_duplicate_counter(group, candidates[0], entries, pairs, stats);
        return;
    }

    if group.len() == 1 {
        let asset = group.into_iter().next().expect("single asset");
        match pick_by_size(candidates, entries) {
            Some(index) => {
                bind(asset, index, Confidence::DuplicateResolved, entries, pairs, stats);
            }
            None => {
                stats.ambiguous += 1;
                push_unmatched(asset, pairs, stats);
            }
        }
        return;
    }

    stats.ambiguous += group.len();
    for asset in group {
        push_unmatched(asset, pairs, stats);
    }
}

fn resolve_duplicate_counter(
    group: Vec<MediaAsset>,
    candidate: usize,
    entries: &mut [SidecarEntry],
    pairs: &mut Vec<MatchedPair>,
    stats: &mut MatchStats,
) {
    let capture = entries[candidate]
        .sidecar
        .capture_time()
        .and_then(time_instant);

    let Some(capture) = capture else {
        stats.ambiguous += group.len();
        for asset in group {
            push_unmatched(asset, pairs, stats);
        }
        return;
    };

    let winner = group
        .iter()
        .enumerate()
        .min_by_key(|(_, asset)| {
            (
                (asset.modified.timestamp() - capture.timestamp()).abs(),
                asset.path.clone(),
            )
        })
        .map(|(index, _)| index)
        .expect("non-empty group");

    for (index, asset) in group.into_iter().enumerate() {
        if index == winner {
            bind(asset, candidate, Confidence::DuplicateResolved, entries, pairs, stats);
        } else {
            push_unmatched(asset, pairs, stats);
        }
    }
}

fn resolve_truncated(
    asset: MediaAsset,
    sidecar_groups: &BTreeMap<MatchKey, Vec<usize>>,
    entries: &mut [SidecarEntry],
    pairs: &mut Vec<MatchedPair>,
    stats: &mut MatchStats,
) {
    let mut best: Option<(&MatchKey, &Vec<usize>)> = None;
    for (key, candidates) in sidecar_groups {
        if key.kind != asset.key.kind
            || key.base.len() >= asset.key.base.len()
            || !asset.key.base.starts_with(&key.base)
        {
            continue;
        }
        if candidates.iter().all(|&index| entries[index].used) {
            continue;
        }
        let better = best
            .map(|(best_key, _)| key.base.len() > best_key.base.len())
            .unwrap_or(true);
        if better {
            best = Some((key, candidates));
        }
    }

    let Some((_, candidates)) = best else {
        push_unmatched(asset, pairs, stats);
        return;
    };
    let candidates = candidates.clone();

    match pick_by_size(&candidates, entries) {
        Some(index) => bind(asset, index, Confidence::Truncated, entries, pairs, stats),
        None => {
            stats.ambiguous += 1;
            push_unmatched(asset, pairs, stats);
        }
    }
}

fn pick_by_size(candidates: &[usize], entries: &[SidecarEntry]) -> Option<usize> {
    let free: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&index| !entries[index].used)
        .collect();
    if free.is_empty() {
        return None;
    }
    if free.len() == 1 {
        return Some(free[0]);
    }

    let distance =
        |index: usize| entries[index].sidecar.byte_size.abs_diff(TYPICAL_SIDECAR_BYTES);
    let best = free
        .iter()
        .copied()
        .min_by_key(|&index| distance(index))
        .expect("non-empty candidates");
    let tied = free
        .iter()
        .filter(|&&index| distance(index) == distance(best))
        .count();
    if tied > 1 {
        None
    } else {
        Some(best)
    }
}

fn bind(
    asset: MediaAsset,
    index: usize,
    confidence: Confidence,
    entries: &mut [SidecarEntry],
    pairs: &mut Vec<MatchedPair>,
    stats: &mut MatchStats,
) {
    entries[index].used = true;
    match confidence {
        Confidence::Exact => stats.exact += 1,
        Confidence::Truncated => stats.truncated += 1,
        Confidence::DuplicateResolved => stats.duplicate_resolved += 1,
        Confidence::Unmatched => unreachable!("bind is never unmatched"),
    }
    pairs.push(MatchedPair {
        asset,
        sidecar: Some(entries[index].sidecar.clone()),
        confidence,
    });
}

fn push_unmatched(asset: MediaAsset, pairs: &mut Vec<MatchedPair>, stats: &mut MatchStats) {
    stats.unmatched += 1;
    pairs.push(MatchedPair {
        asset,
        sidecar: None,
        confidence: Confidence::Unmatched,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_key::{MatchKey, MediaKind};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn asset(name: &str, kind: MediaKind, modified_epoch: i64) -> MediaAsset {
        let path = PathBuf::from(format!("/takeout/{name}"));
        let stem = path.file_stem().unwrap().to_str().unwrap();
        MediaAsset {
            key: MatchKey::for_media(stem, kind, &[]),
            path,
            kind,
            byte_size: 2_000_000,
            modified: Utc.timestamp_opt(modified_epoch, 0).unwrap(),
            extension: name.rsplit('.').next().unwrap().to_string(),
        }
    }

    fn sidecar(file_name: &str, title: Option<&str>, taken_epoch: Option<i64>) -> RawSidecar {
        sidecar_sized(file_name, title, taken_epoch, 900)
    }

    fn sidecar_sized(
        file_name: &str,
        title: Option<&str>,
        taken_epoch: Option<i64>,
        byte_size: u64,
    ) -> RawSidecar {
        RawSidecar {
            path: PathBuf::from(format!("/takeout/{file_name}")),
            byte_size,
            title: title.map(str::to_string),
            taken: taken_epoch.map(|epoch| crate::sidecar::SidecarTime {
                epoch: Some(epoch),
                formatted: None,
            }),
            created: None,
            modified: None,
            geo: None,
            description: None,
            people: Vec::new(),
            favorited: false,
            trashed: false,
            archived: false,
            device: None,
            album: false,
        }
    }

    #[test]
    fn one_to_one_pair_matches_exact() {
        let assets = vec![asset("IMG_0001.jpg", MediaKind::Image, 1000)];
        let sidecars = vec![sidecar("IMG_0001.jpg.json", Some("IMG_0001.jpg"), Some(1000))];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].confidence, Confidence::Exact);
        assert!(pairs[0].sidecar.is_some());
        assert_eq!(stats.exact, 1);
        assert_eq!(stats.unmatched, 0);
    }

    #[test]
    fn matching_is_idempotent_and_order_independent() {
        let build_assets = || {
            vec![
                asset("IMG_0002.jpg", MediaKind::Image, 2000),
                asset("IMG_0001.jpg", MediaKind::Image, 1000),
                asset("CLIP.mp4", MediaKind::Video, 3000),
            ]
        };
        let build_sidecars = || {
            vec![
                sidecar("CLIP.mp4.json", Some("CLIP.mp4"), Some(3000)),
                sidecar("IMG_0001.jpg.json", Some("IMG_0001.jpg"), Some(1000)),
                sidecar("IMG_0002.jpg.json", Some("IMG_0002.jpg"), Some(2000)),
            ]
        };

        let (first, _) = match_assets(build_assets(), build_sidecars(), &[]);
        let mut reversed_assets = build_assets();
        reversed_assets.reverse();
        let mut reversed_sidecars = build_sidecars();
        reversed_sidecars.reverse();
        let (second, _) = match_assets(reversed_assets, reversed_sidecars, &[]);

        let describe = |pairs: &[MatchedPair]| -> Vec<(PathBuf, Option<PathBuf>, Confidence)> {
            pairs
                .iter()
                .map(|p| {
                    (
                        p.asset.path.clone(),
                        p.sidecar.as_ref().map(|s| s.path.clone()),
                        p.confidence,
                    )
                })
                .collect()
        };
        assert_eq!(describe(&first), describe(&second));
    }

    #[test]
    fn truncated_sidecar_key_matches_longest_prefix() {
        let assets = vec![asset(
            "a_very_long_holiday_filename_from_2021.jpg",
            MediaKind::Image,
            1000,
        )];
        let sidecars = vec![
            sidecar(
                "a_very_long_holiday.jpg.json",
                Some("a_very_long_holiday.jpg"),
                Some(10),
            ),
            sidecar(
                "a_very_long_holiday_filename.jpg.json",
                Some("a_very_long_holiday_filename.jpg"),
                Some(20),
            ),
        ];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        assert_eq!(pairs[0].confidence, Confidence::Truncated);
        let bound = pairs[0].sidecar.as_ref().expect("sidecar");
        assert_eq!(bound.title.as_deref(), Some("a_very_long_holiday_filename.jpg"));
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.unbound_sidecars, 1);
    }

    #[test]
    fn truncated_match_ignores_other_extension_class() {
        let assets = vec![asset("trip_day_one_morning.mp4", MediaKind::Video, 1000)];
        let sidecars = vec![sidecar("trip_day_one.jpg.json", Some("trip_day_one.jpg"), Some(10))];

        let (pairs, _) = match_assets(assets, sidecars, &[]);
        assert_eq!(pairs[0].confidence, Confidence::Unmatched);
    }

    #[test]
    fn truncation_tie_on_size_is_rejected_not_guessed() {
        let assets = vec![asset("sunset_beach_panorama.jpg", MediaKind::Image, 1000)];
        let sidecars = vec![
            sidecar_sized("sunset_beach.jpg.json", Some("sunset_beach.jpg"), Some(10), 700),
            sidecar_sized("sunset_beach.jpg(1).json", Some("sunset_beach.jpg"), Some(20), 700),
        ];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        assert_eq!(pairs[0].confidence, Confidence::Unmatched);
        assert_eq!(stats.ambiguous, 1);
    }

    #[test]
    fn truncation_size_heuristic_picks_typical_candidate() {
        let assets = vec![asset("sunset_beach_panorama.jpg", MediaKind::Image, 1000)];
        let sidecars = vec![
            sidecar_sized("sunset_beach.jpg.json", Some("sunset_beach.jpg"), Some(10), 64),
            sidecar_sized("sunset_beach.jpg(1).json", Some("sunset_beach.jpg"), Some(20), 980),
        ];

        let (pairs, _) = match_assets(assets, sidecars, &[]);
        assert_eq!(pairs[0].confidence, Confidence::Truncated);
        assert_eq!(pairs[0].sidecar.as_ref().unwrap().byte_size, 980);
    }

    #[test]
    fn duplicate_counter_binds_closest_mtime_and_leaves_rest_unmatched() {
        let t = 1_600_000_000;
        let assets = vec![
            asset("IMG_1.jpg", MediaKind::Image, t),
            asset("IMG_1(1).jpg", MediaKind::Image, t + 3600),
        ];
        let sidecars = vec![sidecar("IMG_1.jpg.json", Some("IMG_1.jpg"), Some(t + 5))];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        let winner = pairs
            .iter()
            .find(|p| p.asset.path.ends_with("IMG_1.jpg"))
            .expect("winner");
        let loser = pairs
            .iter()
            .find(|p| p.asset.path.ends_with("IMG_1(1).jpg"))
            .expect("loser");
        assert_eq!(winner.confidence, Confidence::DuplicateResolved);
        assert!(winner.sidecar.is_some());
        assert_eq!(loser.confidence, Confidence::Unmatched);
        assert!(loser.sidecar.is_none());
        assert_eq!(stats.duplicate_resolved, 1);
        assert_eq!(stats.unmatched, 1);
    }

    #[test]
    fn no_sidecar_is_shared_between_assets() {
        let t = 1_600_000_000;
        let assets = vec![
            asset("IMG_1.jpg", MediaKind::Image, t),
            asset("IMG_1(1).jpg", MediaKind::Image, t + 60),
            asset("IMG_1 (2).jpg", MediaKind::Image, t + 120),
            asset("long_vacation_name_tail.jpg", MediaKind::Image, t),
        ];
        let sidecars = vec![
            sidecar("IMG_1.jpg.json", Some("IMG_1.jpg"), Some(t)),
            sidecar("long_vacation.jpg.json", Some("long_vacation.jpg"), Some(t)),
        ];

        let (pairs, _) = match_assets(assets, sidecars, &[]);
        let bound: Vec<PathBuf> = pairs
            .iter()
            .filter_map(|p| p.sidecar.as_ref().map(|s| s.path.clone()))
            .collect();
        let unique: HashSet<&PathBuf> = bound.iter().collect();
        assert_eq!(bound.len(), unique.len());
    }

    #[test]
    fn album_sidecars_are_flagged_and_never_bound() {
        let mut album = sidecar("metadata.json", Some("Summer trip"), None);
        album.album = true;
        let assets = vec![
            asset("IMG_7.jpg", MediaKind::Image, 1000),
            asset("IMG_8.jpg", MediaKind::Image, 2000),
        ];

        let (pairs, stats) = match_assets(assets, vec![album], &[]);
        assert!(pairs.iter().all(|p| p.sidecar.is_none()));
        assert_eq!(stats.album_sidecars, 1);
        assert_eq!(stats.unmatched, 2);
    }

    #[test]
    fn duplicate_group_without_capture_time_stays_unmatched() {
        let assets = vec![
            asset("IMG_2.jpg", MediaKind::Image, 1000),
            asset("IMG_2(1).jpg", MediaKind::Image, 2000),
        ];
        let sidecars = vec![sidecar("IMG_2.jpg.json", Some("IMG_2.jpg"), None)];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        assert!(pairs.iter().all(|p| p.confidence == Confidence::Unmatched));
        assert_eq!(stats.ambiguous, 2);
        assert_eq!(stats.unbound_sidecars, 1);
    }

    #[test]
    fn edited_variant_joins_the_base_group() {
        let t = 1_600_000_000;
        let assets = vec![
            asset("IMG_3.jpg", MediaKind::Image, t),
            asset("IMG_3-edited.jpg", MediaKind::Image, t + 9000),
        ];
        let sidecars = vec![sidecar("IMG_3.jpg.json", Some("IMG_3.jpg"), Some(t + 2))];

        let (pairs, stats) = match_assets(assets, sidecars, &[]);
        let original = pairs
            .iter()
            .find(|p| p.asset.path.ends_with("IMG_3.jpg"))
            .expect("original");
        assert_eq!(original.confidence, Confidence::DuplicateResolved);
        assert_eq!(stats.unmatched, 1);
    }
}
