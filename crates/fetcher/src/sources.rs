//! Source configuration rows

use potd_common::db::PictureStore;
use potd_common::Source;
use tracing::info;

use crate::errors::PipelineResult;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub created: usize,
    pub updated: usize,
}

/// Make sure every source has a configuration row. Sources in `disabled`
/// end up disabled, all others enabled.
pub async fn init_sources(store: &dyn PictureStore, disabled: &[Source]) -> PipelineResult<InitReport> {
    let mut report = InitReport::default();

    for source in Source::ALL {
        let wanted = !disabled.contains(&source);

        match store.find_source_config(source).await? {
            None => {
                store.create_source_config(source, wanted).await?;
                report.created += 1;
                info!(source = %source, enabled = wanted, "Created source configuration");
            }
            Some(existing) if existing.is_enabled != wanted => {
                store.set_source_enabled(source, wanted).await?;
                report.updated += 1;
                info!(source = %source, enabled = wanted, "Updated source configuration");
            }
            Some(_) => {}
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use potd_common::db::enabled_sources;
    use potd_common::InMemoryStore;

    #[tokio::test]
    async fn test_init_creates_then_updates() {
        let store = InMemoryStore::new();

        let report = init_sources(&store, &[]).await.unwrap();
        assert_eq!(report, InitReport { created: 3, updated: 0 });

        let report = init_sources(&store, &[]).await.unwrap();
        assert_eq!(report, InitReport::default());

        let report = init_sources(&store, &[Source::Bing]).await.unwrap();
        assert_eq!(report, InitReport { created: 0, updated: 1 });

        let enabled = enabled_sources(&store).await.unwrap();
        assert_eq!(enabled, vec![Source::Apod, Source::Wikipedia]);
    }

    #[tokio::test]
    async fn test_display_name_defaults_to_label() {
        let store = InMemoryStore::new();
        init_sources(&store, &[]).await.unwrap();

        let config = store.find_source_config(Source::Apod).await.unwrap().unwrap();
        assert_eq!(
            config.display_name.as_deref(),
            Some("Astronomy Picture of the Day (NASA)")
        );
    }
}
