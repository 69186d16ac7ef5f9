/// Address and serial bans with serial propagation.
pub mod ban_service;
/// Game library and rejected list management.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Background display-name enrichment.
pub mod name_enrichment;
/// Display-name lookup against the store API.
pub mod name_lookup;
/// Visit recording and active counts.
pub mod presence_service;
/// Administrative snapshot assembly and caching.
pub mod snapshot_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
