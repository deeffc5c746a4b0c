#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionErrorKind {
    #[error("Bean definition `{name}` is already registered")]
    Duplicate { name: String },
    #[error("No bean definition found for `{name}`")]
    NoSuchDefinition { name: String },
}
