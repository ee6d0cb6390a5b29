use crate::{
    export::ExportError, models::InvalidInputError, provider::ProviderError, query::ParseError,
    store::StoreError,
};

#[derive(thiserror::Error, Debug)]
pub enum TrafficError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
