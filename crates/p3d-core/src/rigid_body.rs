// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rigidly welded part sets.

use p3d_geom::CFrame;
use slotmap::SlotMap;

use crate::ident::PartId;
use crate::inertia::MassProperties;
use crate::part::Part;

/// A part welded to a rigid body's main part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachedPart {
    /// Frame of the part relative to the main part.
    pub attachment: CFrame,
    /// The part.
    pub part: PartId,
}

/// A main part plus parts welded to it.
///
/// Mass properties are cached and expressed in the main part's frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub(crate) main_part: PartId,
    pub(crate) parts: Vec<AttachedPart>,
    pub(crate) mass: MassProperties,
}

impl RigidBody {
    pub(crate) fn new(main_part: PartId) -> Self {
        Self { main_part, parts: Vec::new(), mass: MassProperties::ZERO }
    }

    /// Part all attachments are relative to.
    pub fn main_part(&self) -> PartId {
        self.main_part
    }

    /// Welded parts, main part excluded.
    pub fn attached_parts(&self) -> &[AttachedPart] {
        &self.parts
    }

    /// Cached mass properties in the main part's frame.
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass
    }

    /// Number of parts including the main part.
    pub fn part_count(&self) -> usize {
        1 + self.parts.len()
    }

    /// Every part, main part first.
    pub fn part_ids(&self) -> impl Iterator<Item = PartId> + '_ {
        core::iter::once(self.main_part).chain(self.parts.iter().map(|a| a.part))
    }

    /// Every part with its frame relative to the main part.
    pub fn parts_with_attachments(&self) -> impl Iterator<Item = (PartId, CFrame)> + '_ {
        core::iter::once((self.main_part, CFrame::IDENTITY)).chain(self.parts.iter().map(|a| (a.part, a.attachment)))
    }

    /// Whether `part` belongs to this body.
    pub fn contains(&self, part: PartId) -> bool {
        self.main_part == part || self.parts.iter().any(|a| a.part == part)
    }

    /// Frame of `part` relative to the main part.
    pub fn attachment_of(&self, part: PartId) -> Option<CFrame> {
        if part == self.main_part {
            return Some(CFrame::IDENTITY);
        }
        self.parts.iter().find(|a| a.part == part).map(|a| a.attachment)
    }

    pub(crate) fn remove_attached(&mut self, part: PartId) -> Option<AttachedPart> {
        let index = self.parts.iter().position(|a| a.part == part)?;
        Some(self.parts.remove(index))
    }

    /// Makes `part` the main part, re-expressing every attachment around it.
    /// Returns the transform `A⁻¹` applied to old main-relative frames, or
    /// `None` if `part` is not attached here.
    pub(crate) fn set_main_part(&mut self, part: PartId) -> Option<CFrame> {
        if part == self.main_part {
            return Some(CFrame::IDENTITY);
        }
        let attached = self.remove_attached(part)?;
        let to_new = attached.attachment.inverse();
        for a in &mut self.parts {
            a.attachment = to_new.local_to_global_cframe(&a.attachment);
        }
        self.parts.push(AttachedPart { attachment: to_new, part: self.main_part });
        self.main_part = part;
        Some(to_new)
    }

    /// Recomputes the cached mass properties from the parts arena.
    pub(crate) fn refresh_mass(&mut self, parts: &SlotMap<PartId, Part>) {
        let mut total = MassProperties::ZERO;
        for (id, attachment) in self.parts_with_attachments() {
            if let Some(part) = parts.get(id) {
                total = total.combine(&part.mass_properties().transformed(&attachment));
            }
        }
        self.mass = total;
    }
}
