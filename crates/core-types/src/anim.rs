//! The closed animation enumerations.
//!
//! Entry and exit types are matched by variant everywhere; no code may rely
//! on discriminant ordering, so reordering a variant can never silently
//! change train or dashboard classification.

use serde::{Deserialize, Serialize};

/// How a headline arrives on screen.
///
/// Slide families travel from off-lane to a resting position; Train
/// families do the same but push already-posted siblings along the axis;
/// Pop and Fade families appear in place; Dashboard families delegate
/// placement to the dashboard that owns the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimEntryType {
    SlideDownLeftTop,
    SlideDownCenterTop,
    SlideDownRightTop,
    SlideInLeftTop,
    SlideInRightTop,
    SlideInLeftBottom,
    SlideInRightBottom,
    SlideUpLeftBottom,
    SlideUpRightBottom,
    SlideUpCenterBottom,
    TrainDownLeftTop,
    TrainDownCenterTop,
    TrainDownRightTop,
    TrainInLeftTop,
    TrainInRightTop,
    TrainInLeftBottom,
    TrainInRightBottom,
    TrainUpLeftBottom,
    TrainUpRightBottom,
    TrainUpCenterBottom,
    PopCenter,
    PopLeftTop,
    PopRightTop,
    PopLeftBottom,
    PopRightBottom,
    FadeCenter,
    FadeLeftTop,
    FadeRightTop,
    FadeLeftBottom,
    FadeRightBottom,
    DashboardDownLeftTop,
    DashboardDownRightTop,
    DashboardInLeftTop,
    DashboardInRightTop,
    DashboardInLeftBottom,
    DashboardInRightBottom,
    DashboardUpLeftBottom,
    DashboardUpRightBottom,
}

impl AnimEntryType {
    pub fn is_slide(self) -> bool {
        use AnimEntryType::*;
        matches!(
            self,
            SlideDownLeftTop
                | SlideDownCenterTop
                | SlideDownRightTop
                | SlideInLeftTop
                | SlideInRightTop
                | SlideInLeftBottom
                | SlideInRightBottom
                | SlideUpLeftBottom
                | SlideUpRightBottom
                | SlideUpCenterBottom
        )
    }

    pub fn is_train(self) -> bool {
        use AnimEntryType::*;
        matches!(
            self,
            TrainDownLeftTop
                | TrainDownCenterTop
                | TrainDownRightTop
                | TrainInLeftTop
                | TrainInRightTop
                | TrainInLeftBottom
                | TrainInRightBottom
                | TrainUpLeftBottom
                | TrainUpRightBottom
                | TrainUpCenterBottom
        )
    }

    pub fn is_pop(self) -> bool {
        use AnimEntryType::*;
        matches!(
            self,
            PopCenter | PopLeftTop | PopRightTop | PopLeftBottom | PopRightBottom
        )
    }

    pub fn is_fade(self) -> bool {
        use AnimEntryType::*;
        matches!(
            self,
            FadeCenter | FadeLeftTop | FadeRightTop | FadeLeftBottom | FadeRightBottom
        )
    }

    pub fn is_dashboard(self) -> bool {
        use AnimEntryType::*;
        matches!(
            self,
            DashboardDownLeftTop
                | DashboardDownRightTop
                | DashboardInLeftTop
                | DashboardInRightTop
                | DashboardInLeftBottom
                | DashboardInRightBottom
                | DashboardUpLeftBottom
                | DashboardUpRightBottom
        )
    }

    /// Slide and Train families animate geometry; Fade animates opacity;
    /// Pop appears in place.
    pub fn moves(self) -> bool {
        self.is_slide() || self.is_train()
    }
}

/// How a headline leaves the screen once its ttl expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimExitType {
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    SlideFadeLeft,
    SlideFadeRight,
    SlideFadeUp,
    SlideFadeDown,
    Fade,
    Pop,
}

impl AnimExitType {
    pub fn is_slide(self) -> bool {
        use AnimExitType::*;
        matches!(self, SlideLeft | SlideRight | SlideUp | SlideDown)
    }

    pub fn is_slide_fade(self) -> bool {
        use AnimExitType::*;
        matches!(
            self,
            SlideFadeLeft | SlideFadeRight | SlideFadeUp | SlideFadeDown
        )
    }

    /// Exits that translate geometry at all (with or without a fade).
    pub fn moves(self) -> bool {
        self.is_slide() || self.is_slide_fade()
    }

    /// Exits along the horizontal axis.
    pub fn is_horizontal(self) -> bool {
        use AnimExitType::*;
        matches!(self, SlideLeft | SlideRight | SlideFadeLeft | SlideFadeRight)
    }
}

/// What happens to a train headline after it becomes ineligible for aging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgeEffects {
    #[default]
    None,
    ReduceOpacityFixed,
    ReduceOpacityByAge,
}

/// Policy for text that does not fit a fixed-size headline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FixedText {
    #[default]
    None,
    ScaleToFit,
    ClipToFit,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ENTRIES: [AnimEntryType; 38] = {
        use AnimEntryType::*;
        [
            SlideDownLeftTop,
            SlideDownCenterTop,
            SlideDownRightTop,
            SlideInLeftTop,
            SlideInRightTop,
            SlideInLeftBottom,
            SlideInRightBottom,
            SlideUpLeftBottom,
            SlideUpRightBottom,
            SlideUpCenterBottom,
            TrainDownLeftTop,
            TrainDownCenterTop,
            TrainDownRightTop,
            TrainInLeftTop,
            TrainInRightTop,
            TrainInLeftBottom,
            TrainInRightBottom,
            TrainUpLeftBottom,
            TrainUpRightBottom,
            TrainUpCenterBottom,
            PopCenter,
            PopLeftTop,
            PopRightTop,
            PopLeftBottom,
            PopRightBottom,
            FadeCenter,
            FadeLeftTop,
            FadeRightTop,
            FadeLeftBottom,
            FadeRightBottom,
            DashboardDownLeftTop,
            DashboardDownRightTop,
            DashboardInLeftTop,
            DashboardInRightTop,
            DashboardInLeftBottom,
            DashboardInRightBottom,
            DashboardUpLeftBottom,
            DashboardUpRightBottom,
        ]
    };

    #[test]
    fn families_partition_the_entry_enum() {
        for e in ALL_ENTRIES {
            let classes = [
                e.is_slide(),
                e.is_train(),
                e.is_pop(),
                e.is_fade(),
                e.is_dashboard(),
            ];
            assert_eq!(
                classes.iter().filter(|c| **c).count(),
                1,
                "{e:?} must belong to exactly one family"
            );
        }
        assert_eq!(ALL_ENTRIES.iter().filter(|e| e.is_slide()).count(), 10);
        assert_eq!(ALL_ENTRIES.iter().filter(|e| e.is_train()).count(), 10);
        assert_eq!(ALL_ENTRIES.iter().filter(|e| e.is_pop()).count(), 5);
        assert_eq!(ALL_ENTRIES.iter().filter(|e| e.is_fade()).count(), 5);
        assert_eq!(ALL_ENTRIES.iter().filter(|e| e.is_dashboard()).count(), 8);
    }

    #[test]
    fn exit_motion_classification() {
        assert!(AnimExitType::SlideLeft.moves());
        assert!(AnimExitType::SlideFadeUp.moves());
        assert!(!AnimExitType::Fade.moves());
        assert!(!AnimExitType::Pop.moves());
        assert!(AnimExitType::SlideFadeRight.is_horizontal());
        assert!(!AnimExitType::SlideDown.is_horizontal());
    }
}
