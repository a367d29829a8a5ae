use std::{collections::BTreeMap, sync::Arc};

use spark_controller::ControllerDescriptor;
use thiserror::Error;

/// 路由冲突：两个控制器声明了相同的路由路径。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("route `{route}` is declared by both `{existing}` and `{incoming}`")]
pub struct RouteConflict {
    pub route: String,
    pub existing: String,
    pub incoming: String,
}

/// `ControllerTable` 维护路由路径到控制器描述符的只读目录。
///
/// # 教案级注释
/// - **目标 (Why)**
///   - 调度器按路由路径查找描述符，冲突应在装载时被捕获而不是在请求时表现为“随机命中”；
/// - **设计要点 (How)**
///   - 内部使用 `BTreeMap<String, Arc<ControllerDescriptor>>`，遍历顺序稳定，便于输出路由清单；
///   - 描述符以 `Arc` 保存，调度线程克隆句柄即可并发只读访问；
/// - **契约 (What)**
///   - 路由路径区分大小写，按原样比较；
///   - 重复路由返回 [`RouteConflict`]，表内容保持不变。
#[derive(Debug, Default, Clone)]
pub struct ControllerTable {
    routes: BTreeMap<String, Arc<ControllerDescriptor>>,
}

impl ControllerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个已编译的控制器。
    pub fn insert(&mut self, descriptor: ControllerDescriptor) -> Result<Arc<ControllerDescriptor>, RouteConflict> {
        if let Some(existing) = self.routes.get(descriptor.url()) {
            return Err(RouteConflict {
                route: descriptor.url().to_owned(),
                existing: existing.name().to_string(),
                incoming: descriptor.name().to_string(),
            });
        }
        let descriptor = Arc::new(descriptor);
        self.routes
            .insert(descriptor.url().to_owned(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn get(&self, route: &str) -> Option<&Arc<ControllerDescriptor>> {
        self.routes.get(route)
    }

    /// 按控制器类型名查找，主要用于诊断。
    pub fn by_name(&self, name: &str) -> Option<&Arc<ControllerDescriptor>> {
        self.routes.values().find(|descriptor| descriptor.name().is(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<ControllerDescriptor>)> {
        self.routes
            .iter()
            .map(|(route, descriptor)| (route.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
