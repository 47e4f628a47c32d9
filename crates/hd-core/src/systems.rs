//! Well-known flow-system uids and the canonical rough-in ordering.
//!
//! Documents reference flow systems by string uid. A handful of uids are
//! fixed across every locale; migrations and validation lean on them.

pub const COLD_WATER: &str = "cold-water";
pub const HOT_WATER: &str = "hot-water";
pub const WARM_WATER: &str = "warm-water";
pub const GAS: &str = "gas";
pub const FIRE_HYDRANT: &str = "fire-hydrant";
pub const FIRE_HOSE_REEL: &str = "fire-hose-reel";
pub const SEWER_DRAINAGE: &str = "sewer-drainage";
pub const SANITARY_PLUMBING: &str = "sanitary-plumbing";
pub const GREASE_WASTE: &str = "grease-waste";
pub const TRADE_WASTE: &str = "trade-waste";
pub const RISING_MAIN: &str = "rising-main";

/// Drainage-only systems. Fixtures discharge into these rather than draw from them.
pub const DRAINAGE_SYSTEMS: [&str; 5] = [
    SEWER_DRAINAGE,
    SANITARY_PLUMBING,
    GREASE_WASTE,
    TRADE_WASTE,
    RISING_MAIN,
];

/// Rough-in traversal order for fixtures: drainage first, then hot, warm,
/// cold, gas and fire services.
const ROUGH_IN_RANK: [&str; 11] = [
    SEWER_DRAINAGE,
    SANITARY_PLUMBING,
    GREASE_WASTE,
    TRADE_WASTE,
    RISING_MAIN,
    HOT_WATER,
    WARM_WATER,
    COLD_WATER,
    GAS,
    FIRE_HOSE_REEL,
    FIRE_HYDRANT,
];

pub fn is_drainage(system_uid: &str) -> bool {
    DRAINAGE_SYSTEMS.contains(&system_uid)
}

/// Position of a system in the rough-in order. Unknown systems share the
/// last rank and fall back to lexicographic order.
pub fn rough_in_rank(system_uid: &str) -> usize {
    ROUGH_IN_RANK
        .iter()
        .position(|s| *s == system_uid)
        .unwrap_or(ROUGH_IN_RANK.len())
}

/// Orders rough-in system uids deterministically: by [`rough_in_rank`], then
/// by uid. Duplicates are kept once.
pub fn canonical_rough_in_order<'a, I>(system_uids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut keys: Vec<&str> = system_uids.into_iter().collect();
    keys.sort_by(|a, b| rough_in_rank(a).cmp(&rough_in_rank(b)).then_with(|| a.cmp(b)));
    keys.dedup();
    keys.into_iter().map(str::to_string).collect()
}
