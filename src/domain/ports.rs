use crate::domain::model::RosterRow;
use crate::utils::error::Result;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// Collaborator that turns an uploaded file into raw rows. Row order carries no meaning.
pub trait RowSource {
    fn rows(&mut self) -> Result<Vec<RosterRow>>;
}
