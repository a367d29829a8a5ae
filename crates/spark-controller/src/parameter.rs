//! # 参数绑定阶段
//!
//! ## 核心意图（Why）
//! - 可绑定参数是调度器在请求到达时要写入控制器实例的字段；调度器只通过访问器/修改器读写，
//!   因此两者必须在编译期确定存在且签名精确，否则请求阶段才暴露的错误将无法定位；
//! - 原始值类型无法表达“未赋值”，一律拒绝。
//!
//! ## 行为契约（What）
//! - 只处理携带参数标记的字段；声明类型为上下文类型的字段由上下文阶段负责，此处静默跳过；
//! - 访问器 `getX`：在主体*直接声明*的方法中查找，零参数、返回类型等于字段类型，可见性不限；
//! - 修改器 `setX`：在主体及其父类链上的*公开*方法中查找，恰好一个字段类型参数，返回类型不限；
//! - 任一字段失败即终止整个主体的编译。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    descriptor::MethodRef,
    error::{CompileError, CompileErrorKind, Result},
    model::{FieldDecl, FieldRole, TypeDecl, TypeName, TypeRef, known, registry::TypeRegistry},
};

/// 单个可绑定字段的编译结果。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParameterBinding {
    field: String,
    ty: TypeName,
    accessor: MethodRef,
    mutator: MethodRef,
    converter: Option<TypeName>,
}

impl ParameterBinding {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// 声明的引用类型；原始类型在编译期即被拒绝，因此这里总是命名类型。
    pub fn ty(&self) -> &TypeName {
        &self.ty
    }

    pub fn accessor(&self) -> &MethodRef {
        &self.accessor
    }

    /// 修改器，`owner` 可能是主体的某个父类。
    pub fn mutator(&self) -> &MethodRef {
        &self.mutator
    }

    pub fn converter(&self) -> Option<&TypeName> {
        self.converter.as_ref()
    }
}

/// 参数阶段的产物：字段 → 绑定，字段 → 转换器。
#[derive(Debug, Default)]
pub(crate) struct ParameterTable {
    pub parameters: BTreeMap<String, ParameterBinding>,
    pub converters: BTreeMap<String, TypeName>,
}

/// 执行参数绑定阶段。
pub(crate) fn bind_parameters(registry: &TypeRegistry, subject: &TypeDecl) -> Result<ParameterTable> {
    let mut table = ParameterTable::default();
    for field in &subject.fields {
        if field.role() != FieldRole::Parameter {
            continue;
        }
        let binding = bind_field(registry, subject, field)?;
        if let Some(converter) = &binding.converter {
            table.converters.insert(field.name.clone(), converter.clone());
        }
        tracing::trace!(
            subject = %subject.name,
            field = %field.name,
            accessor = %binding.accessor,
            mutator = %binding.mutator,
            "parameter bound"
        );
        table.parameters.insert(field.name.clone(), binding);
    }
    Ok(table)
}

fn bind_field(registry: &TypeRegistry, subject: &TypeDecl, field: &FieldDecl) -> Result<ParameterBinding> {
    let fail = |kind, reason: String| {
        CompileError::new(kind, subject.name.as_str(), reason)
    };

    let ty = match &field.ty {
        TypeRef::Named(name) => name.clone(),
        TypeRef::Primitive(primitive) => {
            return Err(fail(
                CompileErrorKind::InvalidParameterType,
                format!(
                    "bindable parameter `{}` has primitive type `{}`; declare a reference type",
                    field.name,
                    primitive.keyword()
                ),
            )
            .with_member(field.name.as_str()));
        }
    };

    let converter = match field.parameter.as_ref().and_then(|marker| marker.declared_converter()) {
        Some(converter) => {
            let resolvable = converter.is(known::CONVERTER) || registry.contains(converter.as_str());
            if !resolvable || !registry.is_assignable_to(converter.as_str(), known::CONVERTER) {
                return Err(fail(
                    CompileErrorKind::InvalidConverter,
                    format!(
                        "converter `{converter}` declared on `{}` is not a `{}`",
                        field.name,
                        known::CONVERTER
                    ),
                )
                .with_member(field.name.as_str()));
            }
            Some(converter.clone())
        }
        None => None,
    };

    let suffix = capitalize(&field.name);

    let accessor_name = format!("get{suffix}");
    let accessor = subject
        .declared_method(&accessor_name, &[])
        .filter(|method| method.returns.as_ref() == Some(&field.ty))
        .map(|method| {
            MethodRef::new(
                subject.name.clone(),
                method.name.as_str(),
                Vec::new(),
                method.returns.clone(),
            )
        })
        .ok_or_else(|| {
            fail(
                CompileErrorKind::MissingAccessor,
                format!("expected `{accessor_name}() -> {}`", field.ty),
            )
            .with_member(accessor_name.as_str())
        })?;

    let mutator_name = format!("set{suffix}");
    let params = [field.ty.clone()];
    let mutator = registry
        .superclass_chain(subject.name.as_str())
        .into_iter()
        .find_map(|owner| {
            owner
                .methods
                .iter()
                .find(|method| method.public && method.name == mutator_name && method.takes(&params))
                .map(|method| {
                    MethodRef::new(
                        owner.name.clone(),
                        method.name.as_str(),
                        method.params.clone(),
                        method.returns.clone(),
                    )
                })
        })
        .ok_or_else(|| {
            fail(
                CompileErrorKind::MissingMutator,
                format!("expected public `{mutator_name}({})`", field.ty),
            )
            .with_member(mutator_name.as_str())
        })?;

    Ok(ParameterBinding {
        field: field.name.clone(),
        ty,
        accessor,
        mutator,
        converter,
    })
}

/// 首字母大写，其余保持原样：`age` → `Age`，`url` → `Url`。
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
