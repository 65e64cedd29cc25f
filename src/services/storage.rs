// 试卷存储服务
// 整个试卷集合保存为单个 JSON 文件，每次修改都整体读取、整体重写

use log::info;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{MockTestError, Result};
use crate::models::{Test, TestSummary};

/// 试卷存储接口
pub trait TestStore: Send + Sync {
    /// 试卷摘要，按创建时间倒序
    fn list(&self) -> Result<Vec<TestSummary>>;

    fn get(&self, id: &str) -> Result<Test>;

    /// 校验后保存；id 为空时分配新 id，已存在则整体替换
    fn save(&self, test: Test) -> Result<Test>;

    fn delete(&self, id: &str) -> Result<()>;
}

/// JSON 文件存储
pub struct JsonFileStore {
    path: PathBuf,
    /// 同一进程内串行化读-改-写
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // 确保数据目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // 锁内不持有数据，中毒后可以直接继续使用
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 读取全部试卷，文件不存在视为空集合
    fn load(&self) -> Result<Vec<Test>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// 写入临时文件后重命名覆盖，避免留下写了一半的文件
    fn persist(&self, tests: &[Test]) -> Result<()> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        tests.serialize(&mut serializer)?;
        buffer.push(b'\n');

        let tmp_path = self.path.with_extension("json.tmp");
        let written =
            write_synced(&tmp_path, &buffer).and_then(|_| fs::rename(&tmp_path, &self.path));
        if let Err(e) = written {
            // 临时文件可能已创建，失败时清理
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

impl TestStore for JsonFileStore {
    fn list(&self) -> Result<Vec<TestSummary>> {
        let mut tests = self.load()?;
        // sort_by 是稳定排序，同一时间的保持文件顺序
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tests.iter().map(Test::summary).collect())
    }

    fn get(&self, id: &str) -> Result<Test> {
        self.load()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| MockTestError::NotFound(id.to_string()))
    }

    fn save(&self, mut test: Test) -> Result<Test> {
        test.fill_question_ids();
        test.validate()?;
        if test.id.trim().is_empty() {
            test.id = Uuid::new_v4().to_string();
        }

        let _guard = self.lock();
        let mut tests = self.load()?;
        match tests.iter_mut().find(|t| t.id == test.id) {
            Some(existing) => *existing = test.clone(),
            None => tests.push(test.clone()),
        }
        self.persist(&tests)?;

        info!(
            "Saved test {} '{}' ({} questions, {} in collection)",
            test.id,
            test.title,
            test.questions.len(),
            tests.len()
        );
        Ok(test)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock();
        let mut tests = self.load()?;
        let initial_len = tests.len();
        tests.retain(|t| t.id != id);
        if tests.len() == initial_len {
            return Err(MockTestError::NotFound(id.to_string()));
        }
        self.persist(&tests)?;

        info!("Deleted test {} ({} remaining)", id, tests.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LanguageMode, Question, SourceMode};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn sample_test(id: &str, title: &str) -> Test {
        let mut test = Test::draft(
            title,
            LanguageMode::Bilingual,
            SourceMode::AiTopic,
            vec![Question {
                id: "q1".to_string(),
                text_en: "Capital of India?".to_string(),
                text_hi: Some("भारत की राजधानी?".to_string()),
                options_en: vec!["Delhi".into(), "Mumbai".into()],
                options_hi: vec!["दिल्ली".into(), "मुंबई".into()],
                correct_option_index: 0,
                explanation: Some("Delhi is the capital.".to_string()),
            }],
        );
        test.id = id.to_string();
        test
    }

    fn store() -> (TempDir, JsonFileStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("tests.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_then_get_roundtrip() {
        let (_dir, store) = store();
        let saved = store.save(sample_test("", "History Mock")).unwrap();
        assert!(!saved.id.is_empty());

        let loaded = store.get(&saved.id).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_save_replaces_same_id() {
        let (_dir, store) = store();
        store.save(sample_test("1", "First title")).unwrap();
        store.save(sample_test("1", "Second title")).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Second title");
    }

    #[test]
    fn test_delete_then_list() {
        let (_dir, store) = store();
        store.save(sample_test("1", "Test A")).unwrap();
        store.save(sample_test("2", "Test B")).unwrap();
        store.delete("1").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "2");
        assert!(matches!(store.get("1"), Err(MockTestError::NotFound(_))));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_dir, store) = store();
        store.save(sample_test("1", "Test A")).unwrap();
        assert!(matches!(store.delete("nope"), Err(MockTestError::NotFound(_))));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_test_is_not_saved() {
        let (_dir, store) = store();
        let mut test = sample_test("1", "Broken");
        test.questions[0].options_en.clear();
        test.questions[0].options_hi.clear();

        assert!(matches!(store.save(test), Err(MockTestError::Validation(_))));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_newest_first() {
        let (_dir, store) = store();
        let mut older = sample_test("old", "Older");
        older.created_at = Utc::now() - Duration::days(1);
        store.save(older).unwrap();
        store.save(sample_test("new", "Newer")).unwrap();

        let ids: Vec<String> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_file_is_pretty_json_array() {
        let (_dir, store) = store();
        store.save(sample_test("1", "Readable")).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("[\n    {"));
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value[0]["source_mode"], "ai-topic");
    }

    #[test]
    fn test_concurrent_saves_keep_every_test() {
        let (_dir, store) = store();
        let writers = 8;

        std::thread::scope(|scope| {
            for i in 0..writers {
                let store = &store;
                scope.spawn(move || {
                    store
                        .save(sample_test(&format!("t{}", i), &format!("Test {}", i)))
                        .unwrap();
                });
            }
        });

        let list = store.list().unwrap();
        assert_eq!(list.len(), writers);
        for i in 0..writers {
            assert!(store.get(&format!("t{}", i)).is_ok());
        }
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // 目标路径是非空目录，rename 会失败
        let path = dir.path().join("tests.json");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let store = JsonFileStore::new(&path).unwrap();

        assert!(matches!(store.persist(&[]), Err(MockTestError::Storage(_))));
        assert!(!dir.path().join("tests.json.tmp").exists());
        assert!(path.is_dir());
    }

    #[test]
    fn test_corrupt_file_is_not_overwritten() {
        let (_dir, store) = store();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.list(), Err(MockTestError::Serialization(_))));
        assert!(store.save(sample_test("1", "New")).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ not json");
    }
}
