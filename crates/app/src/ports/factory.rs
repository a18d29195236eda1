//! Component factory port — creates components by class name.

use crate::ports::ComponentRef;

/// Creates fresh, unregistered component instances.
///
/// Integrations (adapter crates) each provide one; the server consults them
/// when loading records and on `create` requests.
pub trait ComponentFactory: Send + Sync {
    /// A new instance of `class`, or `None` when the class is unknown.
    fn create(&self, class: &str) -> Option<ComponentRef>;

    /// Every class name this factory can create.
    fn classes(&self) -> Vec<String>;
}

/// Several factories tried in order.
impl ComponentFactory for Vec<Box<dyn ComponentFactory>> {
    fn create(&self, class: &str) -> Option<ComponentRef> {
        self.iter().find_map(|factory| factory.create(class))
    }

    fn classes(&self) -> Vec<String> {
        self.iter().flat_map(|factory| factory.classes()).collect()
    }
}
