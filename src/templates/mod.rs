// HTML templates for web server

/// Provisioning page served at `/`
pub const PROVISION_PAGE: &str = include_str!("provision.html");

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::api::routes;

    #[test]
    fn test_page_references_every_route() {
        for route in routes::API {
            assert!(
                PROVISION_PAGE.contains(&format!("'{}'", route)),
                "provisioning page does not use {}",
                route
            );
        }
    }
}
