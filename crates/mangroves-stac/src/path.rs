//! Naming of output objects.

use mangroves_grid::TileIndex;

/// Default project prefix for item ids.
pub const DEFAULT_PREFIX: &str = "dep";

/// Default AWS region of the output bucket.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Where the outputs of one dataset/version/time are stored.
///
/// ```
/// use mangroves_grid::TileIndex;
/// use mangroves_stac::ItemPath;
///
/// let path = ItemPath::new("s2", "mangroves", "0.1.0", "2020");
/// let tile = TileIndex::new(66, 21);
/// assert_eq!(
///     path.stac_path(tile),
///     "dep_s2_mangroves/0-1-0/066/021/2020/dep_s2_mangroves_066_021_2020.stac-item.json"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPath {
    pub prefix: String,
    pub sensor: String,
    pub dataset_id: String,
    pub version: String,
    pub time: String,
    /// Prepended to every key, e.g. a bucket sub-folder.
    pub output_prefix: Option<String>,
}

impl ItemPath {
    pub fn new(sensor: &str, dataset_id: &str, version: &str, time: &str) -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            sensor: sensor.to_string(),
            dataset_id: dataset_id.to_string(),
            version: version.to_string(),
            time: time.to_string(),
            output_prefix: None,
        }
    }

    /// Set the key prefix. Empty strings and surrounding slashes are ignored.
    pub fn with_output_prefix(mut self, prefix: Option<&str>) -> Self {
        self.output_prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        self
    }

    /// `{prefix}_{sensor}_{dataset_id}`
    pub fn item_prefix(&self) -> String {
        format!("{}_{}_{}", self.prefix, self.sensor, self.dataset_id)
    }

    /// Version with dots replaced by dashes.
    pub fn version_folder(&self) -> String {
        self.version.replace('.', "-")
    }

    /// Time with slashes replaced by underscores.
    pub fn time_folder(&self) -> String {
        self.time.replace('/', "_")
    }

    pub fn folder(&self, tile: TileIndex) -> String {
        let [x, y] = tile.padded();
        self.prefixed(format!(
            "{}/{}/{}/{}/{}",
            self.item_prefix(),
            self.version_folder(),
            x,
            y,
            self.time_folder()
        ))
    }

    /// Item id, also the file stem of every output of the tile.
    pub fn basename(&self, tile: TileIndex) -> String {
        let [x, y] = tile.padded();
        format!("{}_{}_{}_{}", self.item_prefix(), x, y, self.time_folder())
    }

    /// Key of an asset, e.g. `path(tile, "mangroves", ".tif")`.
    pub fn path(&self, tile: TileIndex, asset: &str, ext: &str) -> String {
        let folder = self.folder(tile);
        let basename = self.basename(tile);
        format!("{folder}/{basename}_{asset}{ext}")
    }

    /// Key of the STAC item document.
    pub fn stac_path(&self, tile: TileIndex) -> String {
        let folder = self.folder(tile);
        let basename = self.basename(tile);
        format!("{folder}/{basename}.stac-item.json")
    }

    /// Key of the dataset run log.
    pub fn log_path(&self) -> String {
        let item_prefix = self.item_prefix();
        let version = self.version_folder();
        self.prefixed(format!(
            "{item_prefix}/{version}/logs/{item_prefix}_{version}_log.csv"
        ))
    }

    fn prefixed(&self, key: String) -> String {
        match &self.output_prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key,
        }
    }
}

/// Public https URL of an S3 object.
pub fn https_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

/// Rewrite `s3://bucket/key` as an https URL. Other hrefs are returned as-is.
pub fn s3_to_https(href: &str, region: &str) -> String {
    match href.strip_prefix("s3://").and_then(|rest| rest.split_once('/')) {
        Some((bucket, key)) => https_url(bucket, region, key),
        None => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_path() -> ItemPath {
        ItemPath::new("s2", "mangroves", "0.1.0", "2020")
    }

    #[test]
    fn test_naming() {
        let path = item_path();
        let tile = TileIndex::new(66, 21);

        assert_eq!(path.item_prefix(), "dep_s2_mangroves");
        assert_eq!(path.folder(tile), "dep_s2_mangroves/0-1-0/066/021/2020");
        assert_eq!(path.basename(tile), "dep_s2_mangroves_066_021_2020");
        assert_eq!(
            path.path(tile, "mangroves", ".tif"),
            "dep_s2_mangroves/0-1-0/066/021/2020/dep_s2_mangroves_066_021_2020_mangroves.tif"
        );
        assert_eq!(
            path.log_path(),
            "dep_s2_mangroves/0-1-0/logs/dep_s2_mangroves_0-1-0_log.csv"
        );
    }

    #[test]
    fn test_time_range_folder() {
        let path = ItemPath::new("s2", "mangroves", "1.0", "2019/2020");
        let tile = TileIndex::new(5, 7);
        assert_eq!(path.basename(tile), "dep_s2_mangroves_005_007_2019_2020");
        assert_eq!(path.folder(tile), "dep_s2_mangroves/1-0/005/007/2019_2020");
    }

    #[test]
    fn test_output_prefix() {
        let path = item_path().with_output_prefix(Some("/dev/"));
        let tile = TileIndex::new(66, 21);
        assert!(path.stac_path(tile).starts_with("dev/dep_s2_mangroves/0-1-0/066/021/"));
        assert!(path.log_path().starts_with("dev/dep_s2_mangroves/"));

        let path = item_path().with_output_prefix(Some(""));
        assert_eq!(path.output_prefix, None);
    }

    #[test]
    fn test_https_urls() {
        assert_eq!(
            https_url("dep-public-staging", "us-west-2", "a/b.json"),
            "https://dep-public-staging.s3.us-west-2.amazonaws.com/a/b.json"
        );
        assert_eq!(
            s3_to_https("s3://bucket/x/y.tif", "us-west-2"),
            "https://bucket.s3.us-west-2.amazonaws.com/x/y.tif"
        );
        assert_eq!(s3_to_https("https://a/b", "us-west-2"), "https://a/b");
        assert_eq!(s3_to_https("s3://bucket-only", "us-west-2"), "s3://bucket-only");
    }
}
