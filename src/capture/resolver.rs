//! Picks the capture source that shows a given display.
//!
//! Source metadata is unreliable across platforms and drivers, so the
//! resolver runs an ordered list of strategies and takes the first answer:
//!
//! 1. `ExactIdentity`       : the source's display hint equals the display id
//! 2. `SecondaryHeuristic`  : for a non-primary target, any source not hinted
//!    as the primary display
//! 3. `OrdinalIndex`        : the source at the display's enumeration index
//! 4. `ResolutionSimilarity`: the source whose pixel size is closest to the
//!    display's bounds times its scale factor
//!
//! New platforms append a strategy with [`SourceResolver::with_strategy`]
//! instead of editing the existing ones.

use super::display::{primary_display, Display};
use super::source::CaptureSource;
use super::CaptureError;
use crate::geometry::{Absolute, Point};
use serde::Serialize;

/// Everything a strategy may look at.
pub struct ResolveContext<'a> {
    pub target: &'a Display,
    pub target_index: usize,
    pub displays: &'a [Display],
    pub sources: &'a [CaptureSource],
    /// Centre of the selection, for strategies that match by position.
    pub center: Point<Absolute>,
}

pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index into `ctx.sources`, or `None` to defer to the next strategy.
    fn pick(&self, ctx: &ResolveContext<'_>) -> Option<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub source_index: usize,
    pub strategy: &'static str,
}

pub struct ExactIdentity;

impl ResolveStrategy for ExactIdentity {
    fn name(&self) -> &'static str {
        "exact-identity"
    }

    fn pick(&self, ctx: &ResolveContext<'_>) -> Option<usize> {
        ctx.sources
            .iter()
            .position(|s| s.display_id_hint.as_deref() == Some(ctx.target.id.as_str()))
    }
}

/// Some platforms report the same or garbled hints for every secondary
/// monitor; the only reliable signal left is "not the primary one".
pub struct SecondaryHeuristic;

impl ResolveStrategy for SecondaryHeuristic {
    fn name(&self) -> &'static str {
        "secondary-heuristic"
    }

    fn pick(&self, ctx: &ResolveContext<'_>) -> Option<usize> {
        let (_, primary) = primary_display(ctx.displays)?;
        if primary.id == ctx.target.id {
            return None;
        }
        ctx.sources
            .iter()
            .position(|s| s.display_id_hint.as_deref() != Some(primary.id.as_str()))
    }
}

pub struct OrdinalIndex;

impl ResolveStrategy for OrdinalIndex {
    fn name(&self) -> &'static str {
        "ordinal-index"
    }

    fn pick(&self, ctx: &ResolveContext<'_>) -> Option<usize> {
        (ctx.target_index < ctx.sources.len()).then_some(ctx.target_index)
    }
}

pub struct ResolutionSimilarity;

impl ResolutionSimilarity {
    /// `1 / (1 + |Δw| + |Δh|)` against the display's expected pixel size.
    pub fn score(display: &Display, source: &CaptureSource) -> f64 {
        let expected_w = display.bounds.width as f64 * display.scale_factor;
        let expected_h = display.bounds.height as f64 * display.scale_factor;
        let size = source.pixel_size();
        let dw = (size.width as f64 - expected_w).abs();
        let dh = (size.height as f64 - expected_h).abs();
        1.0 / (1.0 + dw + dh)
    }
}

impl ResolveStrategy for ResolutionSimilarity {
    fn name(&self) -> &'static str {
        "resolution-similarity"
    }

    fn pick(&self, ctx: &ResolveContext<'_>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, source) in ctx.sources.iter().enumerate() {
            let score = Self::score(ctx.target, source);
            // Strict comparison keeps the first-enumerated source on ties.
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }
}

pub struct SourceResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl SourceResolver {
    /// A resolver with no strategies; every lookup fails until some are added.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ResolveStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<Resolution, CaptureError> {
        if ctx.sources.is_empty() {
            return Err(CaptureError::NoCaptureSourcesAvailable);
        }

        for strategy in &self.strategies {
            match strategy.pick(ctx) {
                Some(i) if i < ctx.sources.len() => {
                    log::info!(
                        "[RESOLVE] Display {} -> source {} via {}",
                        ctx.target.id,
                        ctx.sources[i].id,
                        strategy.name()
                    );
                    return Ok(Resolution {
                        source_index: i,
                        strategy: strategy.name(),
                    });
                }
                Some(i) => {
                    log::warn!(
                        "[RESOLVE] Strategy {} returned out-of-range index {}",
                        strategy.name(),
                        i
                    );
                }
                None => {
                    log::debug!("[RESOLVE] Strategy {} had no match", strategy.name());
                }
            }
        }

        Err(CaptureError::NoMatchingSource {
            display_id: ctx.target.id.clone(),
        })
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::empty()
            .with_strategy(ExactIdentity)
            .with_strategy(SecondaryHeuristic)
            .with_strategy(OrdinalIndex)
            .with_strategy(ResolutionSimilarity)
    }
}
