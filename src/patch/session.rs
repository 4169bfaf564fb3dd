//! Patch session state machine
//!
//! A [`PatchSession`] owns everything a live patch needs: the selected
//! layout, the mirror cells the patched code reads from, the replacement
//! pointer values, and, while patched, the resolved base address plus the
//! per-site records required to reverse the rewrite exactly.

use std::cell::Cell;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::layout::{DerivedKind, PatchLayout, SITE_COUNT};
use crate::bounds::Bounds;
use crate::config::{DEFAULT_MAX_RANGE, DEFAULT_MIN_RANGE};
use crate::error::{PatchError, PatchResult};
use crate::memory::{scan, slot_value, ForeignSlot, ModuleMemory, Signature};

/// Saved state for one rewritten slot
///
/// The original pointer value is the only state needed to reverse the
/// patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord {
    /// Slot offset from the signature match
    pub offset: usize,
    /// Pointer value the slot held before the rewrite
    pub original: u32,
}

/// Heap-pinned cells the patched code reads instead of its data section
///
/// Boxed so the addresses stay stable for the lifetime of the session.
struct MirrorCells {
    lower: Box<Cell<f32>>,
    upper: Box<Cell<f32>>,
    derived: Box<Cell<f32>>,
}

enum State {
    Unpatched,
    Patched {
        base: usize,
        records: Vec<PatchRecord>,
    },
}

/// Serializable snapshot of a session for the host
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStatus {
    pub patched: bool,
    pub platform: String,
    pub base_addr: Option<usize>,
    pub lower_bound: f32,
    pub upper_bound: f32,
    pub scale_factor: f32,
    pub negated_upper: f32,
}

/// The patch/unpatch engine
///
/// Two stable states, one transition each way: [`apply`](Self::apply)
/// moves Unpatched to Patched, [`reverse`](Self::reverse) moves back.
pub struct PatchSession {
    layout: &'static PatchLayout,
    signature: Signature,
    bounds: Bounds,
    mirror: MirrorCells,
    bindings: [u32; SITE_COUNT],
    state: State,
}

impl PatchSession {
    /// Create a session whose installed pointers are the addresses of its
    /// own mirror cells.
    ///
    /// The patched slots are 4 bytes wide, so this fails with
    /// [`PatchError::SlotOverflow`] when a cell lives above the 4 GiB
    /// boundary. In the 32-bit server processes this patch targets the
    /// whole address space is encodable.
    pub fn new(layout: &'static PatchLayout) -> PatchResult<Self> {
        let mut session = Self::with_bindings(layout, [0; SITE_COUNT])?;
        session.bindings = [
            slot_value(session.mirror.lower.as_ptr() as usize)?,
            slot_value(session.mirror.upper.as_ptr() as usize)?,
            slot_value(session.mirror.derived.as_ptr() as usize)?,
        ];
        Ok(session)
    }

    /// Create a session that installs caller-chosen slot values instead of
    /// the mirror cell addresses. Hosts that relocate the storage cells
    /// into the target's 32-bit address space (and tests against a fake
    /// module) bind the slots themselves.
    pub fn with_bindings(
        layout: &'static PatchLayout,
        bindings: [u32; SITE_COUNT],
    ) -> PatchResult<Self> {
        let signature = Signature::parse(layout.signature)?;
        let bounds = Bounds::new(DEFAULT_MIN_RANGE, DEFAULT_MAX_RANGE, layout.zero_range_policy);
        let derived = bounds.derived();
        let mirror = MirrorCells {
            lower: Box::new(Cell::new(bounds.lower())),
            upper: Box::new(Cell::new(bounds.upper())),
            derived: Box::new(Cell::new(match layout.derived_kind {
                DerivedKind::ScaleFactor => derived.scale_factor,
                DerivedKind::NegatedUpper => derived.negated_upper,
            })),
        };
        Ok(Self {
            layout,
            signature,
            bounds,
            mirror,
            bindings,
            state: State::Unpatched,
        })
    }

    /// Selected layout
    pub fn layout(&self) -> &'static PatchLayout {
        self.layout
    }

    /// Whether a patch is currently active
    pub fn is_patched(&self) -> bool {
        matches!(self.state, State::Patched { .. })
    }

    /// Resolved signature address while patched
    pub fn base_addr(&self) -> Option<usize> {
        match &self.state {
            State::Patched { base, .. } => Some(*base),
            State::Unpatched => None,
        }
    }

    /// Per-site records while patched, in patch order
    pub fn records(&self) -> Option<&[PatchRecord]> {
        match &self.state {
            State::Patched { records, .. } => Some(records),
            State::Unpatched => None,
        }
    }

    /// Current bounds
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Value the patched code currently reads for the lower bound
    pub fn mirrored_lower(&self) -> f32 {
        self.mirror.lower.get()
    }

    /// Value the patched code currently reads for the upper bound
    pub fn mirrored_upper(&self) -> f32 {
        self.mirror.upper.get()
    }

    /// Value the patched code currently reads for the derived slot
    pub fn mirrored_derived(&self) -> f32 {
        self.mirror.derived.get()
    }

    /// Apply the patch (Unpatched -> Patched). Returns the resolved
    /// signature address.
    ///
    /// Scans for the signature, makes the site span writable, then for
    /// each site in fixed order saves the original pointer, seeds the
    /// mirror cell with the float it referred to, and installs the
    /// replacement. A failure before the first site write leaves no
    /// partial state; a failure after it rolls the written sites back
    /// before reporting.
    pub fn apply(&mut self, mem: &mut dyn ModuleMemory) -> PatchResult<usize> {
        if self.is_patched() {
            return Err(PatchError::AlreadyPatched);
        }

        let base = scan(mem, &self.signature).ok_or(PatchError::SignatureNotFound)?;
        info!(
            "found {} signature at {:#x}",
            self.layout.platform.id(),
            base
        );

        // a match whose site span leaves the module means the layout is
        // stale for this binary
        if base + self.layout.span() > mem.base() + mem.len() {
            warn!("match at {base:#x} leaves no room for the patch sites");
            return Err(PatchError::SignatureNotFound);
        }

        mem.make_writable(base, self.layout.span())?;

        let mut records = Vec::with_capacity(SITE_COUNT);
        let mut seeded = [0f32; SITE_COUNT];
        for (index, &offset) in self.layout.site_offsets.iter().enumerate() {
            match self.install_site(mem, base, index) {
                Ok((record, value)) => {
                    records.push(record);
                    seeded[index] = value;
                }
                Err(err) => {
                    warn!("patching slot at offset {offset} failed, rolling back: {err}");
                    self.rollback(mem, base, &records);
                    return Err(err);
                }
            }
        }

        // Mirror the raw values read through the original pointers; the
        // first configuration update supersedes them.
        self.mirror.lower.set(seeded[0]);
        self.mirror.upper.set(seeded[1]);
        self.mirror.derived.set(seeded[2]);
        self.bounds.set_lower(seeded[0]);
        self.bounds.set_upper(seeded[1]);

        self.state = State::Patched { base, records };
        info!("patched {SITE_COUNT} slots at {base:#x}");
        Ok(base)
    }

    /// Reverse the patch (Patched -> Unpatched).
    ///
    /// Writes the saved original pointers back in the same fixed order.
    /// The pages are still writable from apply, so no protection call is
    /// needed. Restoration is best-effort: a failing site is reported but
    /// the remaining sites are still restored and the session ends up
    /// Unpatched either way.
    pub fn reverse(&mut self, mem: &mut dyn ModuleMemory) -> PatchResult<()> {
        let (base, records) = match std::mem::replace(&mut self.state, State::Unpatched) {
            State::Patched { base, records } => (base, records),
            State::Unpatched => return Err(PatchError::NotPatched),
        };

        let mut first_err = None;
        for record in &records {
            let slot = ForeignSlot::new(base + record.offset);
            if let Err(err) = slot.write_ptr(mem, record.original) {
                warn!("restoring slot at {:#x} failed: {err}", slot.addr());
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => {
                info!("restored {} slots at {base:#x}", records.len());
                Ok(())
            }
        }
    }

    /// Replace the lower bound and synchronously republish all mirrored
    /// values
    pub fn set_lower_bound(&mut self, value: f32) {
        self.bounds.set_lower(value);
        self.push_bounds();
    }

    /// Replace the upper bound and synchronously republish all mirrored
    /// values
    pub fn set_upper_bound(&mut self, value: f32) {
        self.bounds.set_upper(value);
        self.push_bounds();
    }

    /// Replace both bounds at once
    pub fn set_bounds(&mut self, lower: f32, upper: f32) {
        self.bounds.set_lower(lower);
        self.bounds.set_upper(upper);
        self.push_bounds();
    }

    /// Snapshot for the host
    pub fn status(&self) -> SessionStatus {
        let derived = self.bounds.derived();
        SessionStatus {
            patched: self.is_patched(),
            platform: self.layout.platform.id().to_string(),
            base_addr: self.base_addr(),
            lower_bound: self.bounds.lower(),
            upper_bound: self.bounds.upper(),
            scale_factor: derived.scale_factor,
            negated_upper: derived.negated_upper,
        }
    }

    fn install_site(
        &self,
        mem: &mut dyn ModuleMemory,
        base: usize,
        index: usize,
    ) -> PatchResult<(PatchRecord, f32)> {
        let offset = self.layout.site_offsets[index];
        let slot = ForeignSlot::new(base + offset);
        let original = slot.read_ptr(mem)?;
        let value = mem.read_f32(original as usize)?;
        slot.write_ptr(mem, self.bindings[index])?;
        Ok((PatchRecord { offset, original }, value))
    }

    fn rollback(&self, mem: &mut dyn ModuleMemory, base: usize, written: &[PatchRecord]) {
        for record in written.iter().rev() {
            let slot = ForeignSlot::new(base + record.offset);
            if let Err(err) = slot.write_ptr(mem, record.original) {
                warn!("rollback of slot at {:#x} failed: {err}", slot.addr());
            }
        }
    }

    fn push_bounds(&self) {
        let derived = self.bounds.derived();
        self.mirror.lower.set(self.bounds.lower());
        self.mirror.upper.set(self.bounds.upper());
        self.mirror.derived.set(match self.layout.derived_kind {
            DerivedKind::ScaleFactor => derived.scale_factor,
            DerivedKind::NegatedUpper => derived.negated_upper,
        });
    }
}
