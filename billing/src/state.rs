use painscout_core::SubscriptionStatus;

/// What a webhook asks the subscription to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Activate,
    Charge,
    Cancel,
    Complete,
    Pause,
    Resume,
    PaymentFailed,
    PaymentCaptured,
}

/// Next status, or `None` when the transition is not allowed from `current`.
///
/// `cancelled` and `completed` are terminal.
pub fn next_status(
    current: SubscriptionStatus,
    transition: Transition,
) -> Option<SubscriptionStatus> {
    use SubscriptionStatus as S;

    match (current, transition) {
        (S::None | S::Active, Transition::Activate) => Some(S::Active),
        (S::None | S::Active | S::PastDue, Transition::Charge) => Some(S::Active),
        (S::Active | S::PastDue, Transition::PaymentCaptured) => Some(S::Active),
        (S::Active | S::PastDue, Transition::PaymentFailed) => Some(S::PastDue),
        (S::Active | S::PastDue, Transition::Cancel) => Some(S::Cancelled),
        (S::Active | S::PastDue, Transition::Complete) => Some(S::Completed),
        (S::Active, Transition::Pause) => Some(S::Paused),
        (S::Paused, Transition::Resume) => Some(S::Active),
        _ => None,
    }
}
