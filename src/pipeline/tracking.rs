use crate::types::{JointType, Skeleton, SkeletonFrame, SkeletonPoint};

/// What happens to the active body when a skeleton frame has no tracked
/// candidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StalenessPolicy {
    /// Forget the previous body. Joints are only read from bodies tracked in
    /// the current frame.
    ClearWhenLost,
    /// Keep the previous body and keep reading its last known joints. This
    /// is how the device sample code behaves and can emit stale positions.
    RetainLast,
}

/// The body whose joints drive cropping, carried from one frame to the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActiveBody {
    skeleton: Option<Skeleton>,
}

impl ActiveBody {
    pub fn none() -> Self {
        Self { skeleton: None }
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    /// Position of `joint` if the active body is tracked.
    pub fn joint_position(&self, joint: JointType) -> Option<SkeletonPoint> {
        self.skeleton
            .as_ref()
            .filter(|skeleton| skeleton.is_tracked())
            .map(|skeleton| skeleton.joint(joint).position)
    }
}

/// Picks the active body for this frame. The last tracked candidate in the
/// array wins; there is no continuity between frames.
pub fn select_active_body(
    previous: ActiveBody,
    frame: &SkeletonFrame,
    policy: StalenessPolicy,
) -> ActiveBody {
    match frame.skeletons.iter().rev().find(|s| s.is_tracked()) {
        Some(skeleton) => ActiveBody {
            skeleton: Some(skeleton.clone()),
        },
        None => match policy {
            StalenessPolicy::RetainLast => previous,
            StalenessPolicy::ClearWhenLost => ActiveBody::none(),
        },
    }
}
