use crate::types::{ConfigError, ConfigResult};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;

/// ファイルパスからBufReaderを作成する
/// パースやデータ変換は呼び出し側で行う
pub fn load_file(file_path: &str) -> ConfigResult<BufReader<File>> {
    let file = File::open(file_path).map_err(|e| ConfigError::config_file(file_path, e))?;
    Ok(BufReader::new(file))
}

/// YAMLファイルからSerdeでDeserializeできる型を読み込む
///
/// YAMLはJSONの上位互換のため、`config.json`もそのまま読み込める。
pub fn load_yaml_from_file<T: DeserializeOwned>(file_path: &str) -> ConfigResult<T> {
    let buf_reader = load_file(file_path)?;
    serde_yaml::from_reader(buf_reader).map_err(|e| ConfigError::decode(file_path, e))
}
