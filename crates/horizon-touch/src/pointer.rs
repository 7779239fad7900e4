//! Pointers: the process-level identity of one contact.
//!
//! A [`Pointer`] represents a finger, pen, mouse or tracked fiducial object
//! for as long as its source reports it present. Every pointer handed out by
//! a pool gets a fresh [`PointerId`], so an id never refers to two physical
//! contacts.
//!
//! # Buttons
//!
//! [`PointerButtons`] stores three bits per button index: pressed (held),
//! down (pressed this frame) and up (released this frame). The down and up
//! bits live for a single frame and are cleared once the frame's events have
//! been dispatched. Touches and objects only ever use the first button.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU32, Ordering};

use horizon_touch_core::Point;

use crate::input::InputSourceId;

static NEXT_POINTER_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique pointer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(u32);

impl PointerId {
    /// Id carried by pointers sitting idle in a pool.
    pub const INVALID: Self = Self(0);

    /// Allocate the next unused id.
    pub fn next() -> Self {
        Self(NEXT_POINTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Whether this id was allocated, as opposed to [`INVALID`](Self::INVALID).
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for PointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of device behind a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerType {
    /// A finger or other touch contact.
    Touch,
    /// A tracked fiducial object or token.
    Object,
    /// A mouse cursor.
    Mouse,
    /// A pen or stylus.
    Pen,
}

impl fmt::Display for PointerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Touch => write!(f, "Touch"),
            Self::Object => write!(f, "Object"),
            Self::Mouse => write!(f, "Mouse"),
            Self::Pen => write!(f, "Pen"),
        }
    }
}

const PRESSED_BIT: u32 = 0b001;
const DOWN_BIT: u32 = 0b010;
const UP_BIT: u32 = 0b100;
const BITS_PER_BUTTON: usize = 3;

/// Per-button pressed/down/up state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointerButtons(u32);

impl PointerButtons {
    /// Number of button indices tracked.
    pub const MAX_BUTTONS: usize = 5;

    /// No button state at all.
    pub const NONE: Self = Self(0);
    /// The first button is held.
    pub const FIRST_BUTTON_PRESSED: Self = Self(PRESSED_BIT);
    /// The first button went down this frame.
    pub const FIRST_BUTTON_DOWN: Self = Self(DOWN_BIT);
    /// The first button went up this frame.
    pub const FIRST_BUTTON_UP: Self = Self(UP_BIT);

    fn bit(index: usize, kind: u32) -> u32 {
        if index < Self::MAX_BUTTONS {
            kind << (index * BITS_PER_BUTTON)
        } else {
            0
        }
    }

    /// The raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether button `index` is held.
    pub fn is_pressed(self, index: usize) -> bool {
        let bit = Self::bit(index, PRESSED_BIT);
        bit != 0 && self.0 & bit != 0
    }

    /// Whether button `index` went down this frame.
    pub fn is_down(self, index: usize) -> bool {
        let bit = Self::bit(index, DOWN_BIT);
        bit != 0 && self.0 & bit != 0
    }

    /// Whether button `index` went up this frame.
    pub fn is_up(self, index: usize) -> bool {
        let bit = Self::bit(index, UP_BIT);
        bit != 0 && self.0 & bit != 0
    }

    /// Whether any button is held.
    pub fn any_pressed(self) -> bool {
        (0..Self::MAX_BUTTONS).any(|index| self.is_pressed(index))
    }

    /// Indices of all held buttons.
    pub fn pressed_buttons(self) -> impl Iterator<Item = usize> {
        (0..Self::MAX_BUTTONS).filter(move |&index| self.is_pressed(index))
    }

    /// Mark button `index` as pressed this frame.
    pub fn press(&mut self, index: usize) {
        self.0 &= !Self::bit(index, UP_BIT);
        self.0 |= Self::bit(index, PRESSED_BIT) | Self::bit(index, DOWN_BIT);
    }

    /// Mark button `index` as released this frame.
    pub fn release(&mut self, index: usize) {
        self.0 &= !(Self::bit(index, PRESSED_BIT) | Self::bit(index, DOWN_BIT));
        self.0 |= Self::bit(index, UP_BIT);
    }

    /// Drop the single-frame down and up bits, keeping held buttons.
    pub fn clear_transitions(&mut self) {
        let mut held = 0;
        for index in 0..Self::MAX_BUTTONS {
            held |= self.0 & Self::bit(index, PRESSED_BIT);
        }
        self.0 = held;
    }
}

impl BitOr for PointerButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PointerButtons {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PointerButtons {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Marker flags attached to a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointerFlags(u32);

impl PointerFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Synthetic pointer that does not come from real hardware.
    pub const INTERNAL: Self = Self(1 << 0);
    /// Pointer re-issued to stand in for a cancelled one.
    pub const RETURNED: Self = Self(1 << 1);

    /// The raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for PointerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PointerFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Fiducial data carried by object pointers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjectData {
    /// Symbol or component id of the tracked object.
    pub object_id: i32,
    /// Rotation in radians.
    pub angle: f32,
}

/// One persistent contact.
///
/// Pointers handed to consumers are snapshots: the input source keeps the
/// live instance and emits a fresh snapshot with every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    id: PointerId,
    pointer_type: PointerType,
    input_source: InputSourceId,
    position: Point,
    previous_position: Point,
    buttons: PointerButtons,
    flags: PointerFlags,
    object: ObjectData,
}

impl Pointer {
    /// Create a pointer with a freshly allocated id.
    pub fn new(pointer_type: PointerType, input_source: InputSourceId) -> Self {
        let mut pointer = Self::idle(pointer_type, input_source);
        pointer.assign_id();
        pointer
    }

    /// Create a pointer without an id, as stored in a pool.
    pub fn idle(pointer_type: PointerType, input_source: InputSourceId) -> Self {
        Self {
            id: PointerId::INVALID,
            pointer_type,
            input_source,
            position: Point::INVALID,
            previous_position: Point::INVALID,
            buttons: PointerButtons::NONE,
            flags: PointerFlags::NONE,
            object: ObjectData::default(),
        }
    }

    /// The pointer's id.
    pub fn id(&self) -> PointerId {
        self.id
    }

    /// The kind of device behind this pointer.
    pub fn pointer_type(&self) -> PointerType {
        self.pointer_type
    }

    /// The input source that owns this pointer.
    pub fn input_source(&self) -> InputSourceId {
        self.input_source
    }

    /// Current position in screen space.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Position before the last change.
    pub fn previous_position(&self) -> Point {
        self.previous_position
    }

    /// Button state.
    pub fn buttons(&self) -> PointerButtons {
        self.buttons
    }

    /// Marker flags.
    pub fn flags(&self) -> PointerFlags {
        self.flags
    }

    /// Whether this pointer stands in for a cancelled one.
    pub fn is_returned(&self) -> bool {
        self.flags.contains(PointerFlags::RETURNED)
    }

    /// Whether this pointer is synthetic.
    pub fn is_internal(&self) -> bool {
        self.flags.contains(PointerFlags::INTERNAL)
    }

    /// Fiducial data, for object pointers only.
    pub fn object(&self) -> Option<ObjectData> {
        (self.pointer_type == PointerType::Object).then_some(self.object)
    }

    /// Symbol id of the tracked object, for object pointers only.
    pub fn object_id(&self) -> Option<i32> {
        self.object().map(|object| object.object_id)
    }

    /// Rotation in radians, for object pointers only.
    pub fn angle(&self) -> Option<f32> {
        self.object().map(|object| object.angle)
    }

    /// Move the pointer.
    ///
    /// The previous position only advances when the position actually
    /// changes. The first placement sets both.
    pub fn set_position(&mut self, position: Point) {
        if !self.position.is_valid() {
            self.position = position;
            self.previous_position = position;
        } else if position != self.position {
            self.previous_position = self.position;
            self.position = position;
        }
    }

    /// Set the fiducial data.
    pub fn set_object(&mut self, object_id: i32, angle: f32) {
        self.object = ObjectData { object_id, angle };
    }

    /// Mutable access to the button state.
    pub fn buttons_mut(&mut self) -> &mut PointerButtons {
        &mut self.buttons
    }

    /// Set marker flags.
    pub fn insert_flags(&mut self, flags: PointerFlags) {
        self.flags.insert(flags);
    }

    /// Copy the observable state of `other`, keeping this pointer's id.
    pub fn copy_from(&mut self, other: &Pointer) {
        self.position = other.position;
        self.previous_position = other.previous_position;
        self.buttons = other.buttons;
        self.flags = other.flags;
        self.object = other.object;
    }

    /// Give this pointer a new id.
    pub fn assign_id(&mut self) {
        self.id = PointerId::next();
    }

    /// Clear every mutable field, including the id.
    pub fn reset(&mut self) {
        self.id = PointerId::INVALID;
        self.position = Point::INVALID;
        self.previous_position = Point::INVALID;
        self.buttons = PointerButtons::NONE;
        self.flags = PointerFlags::NONE;
        self.object = ObjectData::default();
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {:.1}, {:.1})",
            self.pointer_type, self.id, self.position.x, self.position.y
        )
    }
}
