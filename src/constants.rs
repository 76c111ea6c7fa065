/// 低于该置信度的姿态样本按丢帧处理
pub const DEFAULT_MIN_POSE_CONFIDENCE: f64 = 0.5;

/// 自适应眨眼阈值在检测器中的可用范围
pub const BLINK_THRESHOLD_MIN: f64 = 0.05;
pub const BLINK_THRESHOLD_MAX: f64 = 0.95;

/// 自适应摇头角度在检测器中的可用范围（度）
pub const SHAKE_ANGLE_MIN_DEG: f64 = 2.0;
pub const SHAKE_ANGLE_MAX_DEG: f64 = 80.0;

/// 帧队列默认容量（约 2 秒 @ 30fps）
pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 64;

/// 事件广播通道默认容量
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// 单次 POST /api/poses 最多接受的帧数
pub const MAX_FRAMES_PER_REQUEST: usize = 512;

/// 单次校准批次最多接受的样本数
pub const MAX_CALIBRATION_SAMPLES: usize = 1_000;

/// SSE 并发连接上限
pub const MAX_SSE_CONNECTIONS: usize = 64;

/// 点头角度基础值（度），没有对应的 profile 字段
pub const HEAD_NOD_BASE_DEG: f64 = 20.0;

/// 张嘴程度基础值
pub const MOUTH_OPEN_BASE: f64 = 0.5;
