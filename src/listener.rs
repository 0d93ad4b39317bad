//! Completion listeners and the payload bundle they receive.

/// Everything captured by a barrier at the moment it fired.
///
/// Every slot's payload is reachable by name through [`Completion::payload`].
/// The primary slot's payload is held apart so it can be moved out with
/// [`Completion::into_primary`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<P> {
    primary_name: Option<String>,
    primary: Option<P>,
    payloads: Vec<(String, Option<P>)>,
}

impl<P> Completion<P> {
    pub(crate) fn new(
        primary_name: Option<String>,
        primary: Option<P>,
        payloads: Vec<(String, Option<P>)>,
    ) -> Self {
        Self {
            primary_name,
            primary,
            payloads,
        }
    }

    /// Name of the primary signal, if the barrier declared one.
    pub fn primary_name(&self) -> Option<&str> {
        self.primary_name.as_deref()
    }

    /// Payload of the primary signal, if the barrier has one and it carried a value.
    pub fn primary(&self) -> Option<&P> {
        self.primary.as_ref()
    }

    pub fn into_primary(self) -> Option<P> {
        self.primary
    }

    /// Payload delivered to the named signal, primary included.
    pub fn payload(&self, name: &str) -> Option<&P> {
        if self.primary_name.as_deref() == Some(name) {
            return self.primary.as_ref();
        }
        self.payloads
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, p)| p.as_ref())
    }

    /// Payloads of the non-primary signals, in declaration order.
    pub fn payloads(&self) -> &[(String, Option<P>)] {
        &self.payloads
    }
}

/// Consumer of a barrier's single terminal callback.
///
/// Taking `self: Box<Self>` makes a second invocation impossible to express.
/// Any `FnOnce(Completion<P>) + Send` closure is a listener.
pub trait CompletionListener<P>: Send {
    fn on_ready(self: Box<Self>, completion: Completion<P>);
}

impl<P, F> CompletionListener<P> for F
where
    F: FnOnce(Completion<P>) + Send,
{
    fn on_ready(self: Box<Self>, completion: Completion<P>) {
        (*self)(completion)
    }
}
