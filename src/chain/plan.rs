//! Ordering of the conversion stages

use crate::audio::{SampleSpec, SampleSpecItem};

/// One converter of a planned chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Dimension converted by this step
    pub item: SampleSpecItem,
    /// Spec entering the step
    pub src: SampleSpec,
    /// Spec leaving the step
    pub dst: SampleSpec,
}

/// Ordered list of single-dimension steps taking one spec to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionPlan {
    steps: Vec<PlanStep>,
}

impl ConversionPlan {
    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Dimensions in execution order
    pub fn items(&self) -> impl Iterator<Item = SampleSpecItem> + '_ {
        self.steps.iter().map(|step| step.item)
    }

    /// Check if no conversion is needed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Plan the steps converting `src` into `dst`
///
/// Dimensions are visited in [`SampleSpecItem::ALL`] order. A dimension whose
/// running value is larger than the destination's is converted on the way
/// down, before later dimensions, so channel count and sample width shrink
/// ahead of resampling. Any other differing dimension is converted on the way
/// back up, after the later ones.
///
/// # Panics
///
/// Panics if the planned steps do not end at `dst`.
#[must_use]
pub fn plan_conversion(src: &SampleSpec, dst: &SampleSpec) -> ConversionPlan {
    let mut plan = ConversionPlan::default();
    let mut running = src.clone();
    plan_item(0, &mut running, dst, &mut plan);

    assert!(
        running == *dst,
        "conversion plan ends at {running:?} instead of {dst:?}"
    );
    plan
}

fn plan_item(depth: usize, running: &mut SampleSpec, dst: &SampleSpec, plan: &mut ConversionPlan) {
    let Some(&item) = SampleSpecItem::ALL.get(depth) else {
        return;
    };

    if running.item(item) > dst.item(item) {
        push_step(item, running, dst, plan);
    }

    plan_item(depth + 1, running, dst, plan);

    if !SampleSpec::is_item_equal(item, running, dst) {
        push_step(item, running, dst, plan);
    }
}

fn push_step(
    item: SampleSpecItem,
    running: &mut SampleSpec,
    dst: &SampleSpec,
    plan: &mut ConversionPlan,
) {
    let src = running.clone();
    running.copy_item_from(item, dst);
    plan.steps.push(PlanStep {
        item,
        src,
        dst: running.clone(),
    });
}
