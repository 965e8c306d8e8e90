//! 平铺记录（通过 parentId 关联）组装为树
//!
//! 父节点 id 不在记录集合中的记录即为根。子节点保持输入顺序。
//! 祖先链无法到达根的记录（例如互为父子的环）不会出现在结果中。

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// 字段名配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    pub id_field: String,
    pub parent_id_field: String,
    pub children_field: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_string(),
            parent_id_field: "parentId".to_string(),
            children_field: "children".to_string(),
        }
    }
}

impl TreeConfig {
    pub fn new(id_field: &str, parent_id_field: &str, children_field: &str) -> Self {
        Self {
            id_field: id_field.to_string(),
            parent_id_field: parent_id_field.to_string(),
            children_field: children_field.to_string(),
        }
    }
}

/// 可组装为树的强类型记录
pub trait TreeRecord: Clone {
    type Key: Eq + Hash;

    fn id(&self) -> Self::Key;
    fn parent_id(&self) -> Self::Key;
    fn set_children(&mut self, children: Vec<Self>);
}

/// 按下标表示的树节点
struct Assembled {
    index: usize,
    children: Vec<Assembled>,
}

fn assemble<K: Eq + Hash>(links: &[(K, K)]) -> Vec<Assembled> {
    let mut children_of: HashMap<&K, Vec<usize>> = HashMap::new();
    let mut ids: HashSet<&K> = HashSet::new();

    for (index, (id, parent_id)) in links.iter().enumerate() {
        children_of.entry(parent_id).or_default().push(index);
        ids.insert(id);
    }

    let mut path = Vec::new();
    let mut roots = Vec::new();
    for (index, (_, parent_id)) in links.iter().enumerate() {
        if !ids.contains(parent_id) {
            roots.push(attach(index, links, &children_of, &mut path));
        }
    }
    roots
}

fn attach<K: Eq + Hash>(
    index: usize,
    links: &[(K, K)],
    children_of: &HashMap<&K, Vec<usize>>,
    path: &mut Vec<usize>,
) -> Assembled {
    path.push(index);

    let mut children = Vec::new();
    if let Some(kids) = children_of.get(&links[index].0) {
        for &kid in kids {
            // 重复 id 可能让记录成为自己的后代
            if path.contains(&kid) {
                continue;
            }
            children.push(attach(kid, links, children_of, path));
        }
    }

    path.pop();
    Assembled { index, children }
}

/// JSON 对象键的字符串形式，与前端对象下标比较一致（1 与 "1" 相同）
fn key_repr(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 将平铺的 JSON 记录组装为树，返回根节点列表
///
/// 输入不被修改；每个可达节点都会带上子节点数组。叶子节点同样写入
/// 空数组，序列化后 `children` 字段总是存在（值为 `[]`），而不是缺省。
/// 非对象记录会被忽略。
pub fn build_tree(records: &[Value], config: &TreeConfig) -> Vec<Value> {
    let objects: Vec<&Map<String, Value>> = records
        .iter()
        .filter_map(|record| match record {
            Value::Object(map) => Some(map),
            other => {
                debug!(record = %other, "跳过非对象记录");
                None
            }
        })
        .collect();

    let links: Vec<(String, String)> = objects
        .iter()
        .map(|map| {
            (
                key_repr(map.get(&config.id_field)),
                key_repr(map.get(&config.parent_id_field)),
            )
        })
        .collect();

    assemble(&links)
        .iter()
        .map(|node| materialize_json(node, &objects, config))
        .collect()
}

fn materialize_json(
    node: &Assembled,
    objects: &[&Map<String, Value>],
    config: &TreeConfig,
) -> Value {
    let mut map = objects[node.index].clone();
    let children = node
        .children
        .iter()
        .map(|child| materialize_json(child, objects, config))
        .collect();
    map.insert(config.children_field.clone(), Value::Array(children));
    Value::Object(map)
}

/// 强类型版本的树组装
pub fn build_tree_typed<R: TreeRecord>(records: &[R]) -> Vec<R> {
    let links: Vec<(R::Key, R::Key)> = records.iter().map(|r| (r.id(), r.parent_id())).collect();
    assemble(&links)
        .iter()
        .map(|node| materialize_typed(node, records))
        .collect()
}

fn materialize_typed<R: TreeRecord>(node: &Assembled, records: &[R]) -> R {
    let mut record = records[node.index].clone();
    record.set_children(
        node.children
            .iter()
            .map(|child| materialize_typed(child, records))
            .collect(),
    );
    record
}

/// 先序遍历展开树，去掉子节点字段
pub fn flatten_tree(roots: &[Value], children_field: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for root in roots {
        flatten_into(root, children_field, &mut out);
    }
    out
}

fn flatten_into(node: &Value, children_field: &str, out: &mut Vec<Value>) {
    let Value::Object(map) = node else {
        return;
    };
    let mut record = map.clone();
    let children = record.remove(children_field);
    out.push(Value::Object(record));

    if let Some(Value::Array(children)) = children {
        for child in &children {
            flatten_into(child, children_field, out);
        }
    }
}
