//! 编译器识别的内建类型名称。
//!
//! 这些名称构成控制器契约的“词汇表”：上下文槽位、唯一合法的 Action 返回类型、
//! 转换器能力接口，以及作为“未声明”占位的根类型。

/// 根类型。`intercepted_by` 中出现时视为占位并被剔除；作为转换器声明时等价于未声明。
pub const OBJECT: &str = "spark.lang.Object";

/// 内建字符串类型，最常见的可绑定参数类型。
pub const STRING: &str = "spark.lang.String";

/// Action 处理方法唯一允许的返回类型。
pub const RESULT: &str = "spark.api.Result";

/// 转换器能力接口；转换器类型必须可赋值给它。
pub const CONVERTER: &str = "spark.api.Converter";

pub const APPLICATION_CONTEXT: &str = "spark.api.ApplicationContext";
pub const COOKIE_CONTEXT: &str = "spark.api.CookieContext";
pub const ERROR_CONTEXT: &str = "spark.api.ErrorContext";
pub const MESSAGE_CONTEXT: &str = "spark.api.MessageContext";
pub const REQUEST_CONTEXT: &str = "spark.api.RequestContext";
pub const SESSION_CONTEXT: &str = "spark.api.SessionContext";

/// Action 标记未声明内容类型时采用的默认值。
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";
