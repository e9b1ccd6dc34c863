use super::*;

#[test]
fn extension_covers_supported_image_types() {
    assert_eq!(extension_for("image/png"), Some("png"));
    assert_eq!(extension_for("image/jpeg"), Some("jpg"));
    assert_eq!(extension_for("image/webp"), Some("webp"));
    assert_eq!(extension_for("image/gif"), Some("gif"));
}

#[test]
fn extension_rejects_everything_else() {
    assert_eq!(extension_for("image/svg+xml"), None);
    assert_eq!(extension_for("text/html"), None);
    assert_eq!(extension_for("application/octet-stream"), None);
    assert_eq!(extension_for(""), None);
}

#[test]
fn random_filename_is_hex_stem_plus_extension() {
    let name = random_filename("png");
    let (stem, ext) = name.split_once('.').expect("filename should have an extension");
    assert_eq!(stem.len(), 32);
    assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(ext, "png");
}

#[test]
fn random_filenames_do_not_collide_trivially() {
    assert_ne!(random_filename("png"), random_filename("png"));
}
