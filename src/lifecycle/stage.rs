use std::fmt::{Display, Formatter};

/// One named phase of the dispatch state machine, in execution order.
///
/// Every stage is an interception point; RequestInit and RequestComplete
/// exist *only* as interception points and run no engine code of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleStage {
    /// First thing, before any resolution work.
    RequestInit,
    /// Resolve the handler instance for the request path.
    ActionBeanResolution,
    /// Resolve the event name and the handler method for it.
    HandlerResolution,
    /// Bind request parameters onto the handler and run field validation.
    BindingAndValidation,
    /// Run the handler's custom validation methods.
    CustomValidation,
    /// Give accumulated validation errors a chance to produce an outcome.
    ValidationErrorHandling,
    /// Invoke the resolved handler method.
    EventHandling,
    /// Execute the chosen resolution against the response.
    ResolutionExecution,
    /// Last thing; outcomes returned here are too late and are ignored.
    RequestComplete,
}

impl LifecycleStage {
    /// All stages in execution order.
    pub const ALL: [LifecycleStage; 9] = [
        LifecycleStage::RequestInit,
        LifecycleStage::ActionBeanResolution,
        LifecycleStage::HandlerResolution,
        LifecycleStage::BindingAndValidation,
        LifecycleStage::CustomValidation,
        LifecycleStage::ValidationErrorHandling,
        LifecycleStage::EventHandling,
        LifecycleStage::ResolutionExecution,
        LifecycleStage::RequestComplete,
    ];
}

impl Display for LifecycleStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleStage::RequestInit => "RequestInit",
            LifecycleStage::ActionBeanResolution => "ActionBeanResolution",
            LifecycleStage::HandlerResolution => "HandlerResolution",
            LifecycleStage::BindingAndValidation => "BindingAndValidation",
            LifecycleStage::CustomValidation => "CustomValidation",
            LifecycleStage::ValidationErrorHandling => "ValidationErrorHandling",
            LifecycleStage::EventHandling => "EventHandling",
            LifecycleStage::ResolutionExecution => "ResolutionExecution",
            LifecycleStage::RequestComplete => "RequestComplete",
        };
        f.write_str(name)
    }
}
